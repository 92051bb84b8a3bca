//! View comparison

use crate::error::Result;
use crate::hints::DiffHints;
use crate::schema::entity::Entity;
use crate::schema::entity_diff::EntityDiff;
use crate::schema::statement::{normalize_whitespace, Statement, TableName};
use crate::schema::types::View;

/// Diff two views. A view with another name is dropped and recreated.
pub(crate) fn diff_views(from: &View, to: &View, hints: &DiffHints) -> Result<EntityDiff> {
    let from_entity = Entity::View(from.clone());
    let to_entity = Entity::View(to.clone());

    if from.name != to.name {
        let mut diff = from_entity.drop_with_hints(hints);
        diff.append_diff(to_entity.create_with_hints(hints));
        return diff.enforce_subsequent_strategy();
    }

    let statement = if views_equal(from, to) {
        None
    } else {
        Some(Statement::AlterView {
            name: TableName::resolve(&to.name, to.qualifier.as_deref(), hints),
            view: to.clone(),
        })
    };
    Ok(EntityDiff::changed(from_entity, to_entity, statement, hints))
}

fn definition(view: &View) -> String {
    normalize_whitespace(view.definition.trim().trim_end_matches(';'))
}

// An unset option means the server default
fn option(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(|v| v.trim().to_uppercase())
        .unwrap_or_else(|| default.to_string())
}

fn views_equal(a: &View, b: &View) -> bool {
    definition(a) == definition(b)
        && a.columns.len() == b.columns.len()
        && a.columns
            .iter()
            .zip(&b.columns)
            .all(|(x, y)| x.eq_ignore_ascii_case(y))
        && option(&a.algorithm, "UNDEFINED") == option(&b.algorithm, "UNDEFINED")
        && option(&a.security, "DEFINER") == option(&b.security, "DEFINER")
}
