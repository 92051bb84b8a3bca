//! Schema difference calculator
//!
//! This module compares two database schemas and produces the ordered list of
//! entity diffs that turns the first into the second.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::hints::{DiffHints, ForeignKeyCheckStrategy, TableRenameStrategy};
use crate::schema::entity::Entity;
use crate::schema::entity_diff::EntityDiff;
use crate::schema::table_diff::same_shape;
use crate::schema::types::{DatabaseSchema, ForeignKeyTableColumns, Table};

/// Changes needed to synchronize two schemas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    diffs: Vec<EntityDiff>,
}

impl SchemaDiff {
    /// Generate a schema diff from `from` to `to`.
    ///
    /// Diffs are grouped as view drops, table diffs, view alterations and
    /// view creations. Table diffs start out as drops, alterations and
    /// renames, then creations, each by name. They are then reordered by
    /// foreign keys: a table comes after the new tables it references, and
    /// a dropped table comes after every diff that removes a reference to
    /// it. A reference cycle keeps the starting order for the tables in it.
    pub fn generate(from: &DatabaseSchema, to: &DatabaseSchema, hints: &DiffHints) -> Result<Self> {
        if hints.foreign_key_check == ForeignKeyCheckStrategy::Strict {
            validate_foreign_keys(to)?;
        }

        let mut view_drops = Vec::new();
        let mut view_alters = Vec::new();
        let mut view_creates = Vec::new();

        for (name, view) in &from.views {
            let entity = Entity::View(view.clone());
            match to.views.get(name) {
                Some(target) => view_alters.push(entity.diff(&Entity::View(target.clone()), hints)?),
                None => view_drops.push(entity.drop_with_hints(hints)),
            }
        }
        for (name, view) in &to.views {
            if !from.views.contains_key(name) {
                view_creates.push(Entity::View(view.clone()).create_with_hints(hints));
            }
        }

        let mut table_drops = Vec::new();
        let mut table_alters = Vec::new();
        let mut table_creates = Vec::new();

        for (name, table) in &from.tables {
            if let Some(target) = to.tables.get(name) {
                table_alters.push(Entity::Table(table.clone()).diff(&Entity::Table(target.clone()), hints)?);
            }
        }

        let mut dropped: Vec<&Table> = from
            .tables
            .values()
            .filter(|t| !to.tables.contains_key(&t.name))
            .collect();
        let mut added: Vec<&Table> = to
            .tables
            .values()
            .filter(|t| !from.tables.contains_key(&t.name))
            .collect();
        dropped.sort_by(|a, b| a.name.cmp(&b.name));
        added.sort_by(|a, b| a.name.cmp(&b.name));

        let mut paired = HashSet::new();
        for table in dropped {
            let partner = match hints.table_rename {
                TableRenameStrategy::HeuristicStatement => added
                    .iter()
                    .find(|candidate| !paired.contains(&candidate.name) && same_shape(table, candidate)),
                TableRenameStrategy::AssumeDifferent => None,
            };
            match partner {
                Some(target) => {
                    paired.insert(target.name.clone());
                    table_alters.push(
                        Entity::Table(table.clone()).diff(&Entity::Table((*target).clone()), hints)?,
                    );
                }
                None => table_drops.push(Entity::Table(table.clone()).drop_with_hints(hints)),
            }
        }
        for table in added {
            if !paired.contains(&table.name) {
                table_creates.push(Entity::Table(table.clone()).create_with_hints(hints));
            }
        }

        let by_name = |mut group: Vec<EntityDiff>| {
            group.retain(|diff| !diff.is_empty());
            group.sort_by(|a, b| a.entity_name().cmp(b.entity_name()));
            group
        };

        let mut tables = Vec::new();
        for group in [table_drops, table_alters, table_creates] {
            tables.extend(by_name(group));
        }

        let mut diffs = by_name(view_drops);
        diffs.extend(order_by_foreign_keys(tables));
        diffs.extend(by_name(view_alters));
        diffs.extend(by_name(view_creates));

        tracing::debug!(
            entities = diffs.len(),
            statements = diffs.iter().map(EntityDiff::chain_len).sum::<usize>(),
            "Generated schema diff"
        );

        Ok(Self { diffs })
    }

    /// Check if the diff is empty (no changes needed)
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Number of changed entities
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDiff> {
        self.diffs.iter()
    }

    pub fn diffs(&self) -> &[EntityDiff] {
        &self.diffs
    }

    pub fn into_diffs(self) -> Vec<EntityDiff> {
        self.diffs
    }

    /// Every statement of every chain, in execution order
    pub fn statements(&self) -> Vec<String> {
        self.diffs
            .iter()
            .flat_map(EntityDiff::statement_strings)
            .collect()
    }

    /// Canonical form of every statement, in execution order
    pub fn canonical_statements(&self) -> Vec<String> {
        self.diffs
            .iter()
            .flat_map(|diff| diff.chain())
            .filter(|diff| !diff.is_empty())
            .map(EntityDiff::canonical_statement_string)
            .collect()
    }
}

fn table_of(entity: Option<&Entity>) -> Option<&Table> {
    match entity {
        Some(Entity::Table(table)) => Some(table),
        _ => None,
    }
}

fn references(table: &Table, name: &str) -> bool {
    !table.name.eq_ignore_ascii_case(name)
        && table
            .foreign_keys
            .iter()
            .any(|fk| fk.ref_table.eq_ignore_ascii_case(name))
}

/// Whether `diff` has to run after `other`
fn depends_on(diff: &EntityDiff, other: &EntityDiff) -> bool {
    let (from, to) = diff.entities();
    let (from, to) = (table_of(from), table_of(to));
    let (other_from, other_to) = other.entities();
    let (other_from, other_to) = (table_of(other_from), table_of(other_to));

    // A referenced table has to exist under its new name first
    let needs_created = match (to, other_to) {
        (Some(to), Some(other_to)) => {
            other_from.map_or(true, |f| !f.name.eq_ignore_ascii_case(&other_to.name))
                && references(to, &other_to.name)
        }
        _ => false,
    };

    // A table can only be dropped once nothing references it
    let needs_released = match (from, to, other_from) {
        (Some(from), None, Some(other_from)) => {
            references(other_from, &from.name)
                && other_to.map_or(true, |t| !references(t, &from.name))
        }
        _ => false,
    };

    needs_created || needs_released
}

/// Stable topological order: the earliest diff whose dependencies have all
/// run goes next. On a cycle the earliest remaining diff goes next.
fn order_by_foreign_keys(diffs: Vec<EntityDiff>) -> Vec<EntityDiff> {
    let dependencies: Vec<Vec<usize>> = diffs
        .iter()
        .enumerate()
        .map(|(i, diff)| {
            (0..diffs.len())
                .filter(|&j| j != i && depends_on(diff, &diffs[j]))
                .collect()
        })
        .collect();

    let mut placed = vec![false; diffs.len()];
    let mut order = Vec::with_capacity(diffs.len());
    while order.len() < diffs.len() {
        let ready = (0..diffs.len())
            .find(|&i| !placed[i] && dependencies[i].iter().all(|&j| placed[j]));
        let next = match ready {
            Some(i) => i,
            None => {
                let Some(i) = (0..diffs.len()).find(|&i| !placed[i]) else {
                    break;
                };
                tracing::warn!(
                    table = diffs[i].entity_name(),
                    "Foreign key cycle, keeping name order"
                );
                i
            }
        };
        placed[next] = true;
        order.push(next);
    }

    let mut slots: Vec<Option<EntityDiff>> = diffs.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}

/// Check that every foreign key points at an existing table and at columns
/// whose types match the referencing ones
fn validate_foreign_keys(schema: &DatabaseSchema) -> Result<()> {
    for table in schema.tables.values() {
        for fk in &table.foreign_keys {
            let referenced = ForeignKeyTableColumns::new(&fk.ref_table, fk.ref_columns.clone())
                .map_err(|e| Error::ForeignKeyReference(format!("{}: {}", fk.name, e)))?;

            let target = schema.tables.get(referenced.table()).ok_or_else(|| {
                Error::ForeignKeyReference(format!(
                    "{} on {} references missing table {}",
                    fk.name,
                    table.name,
                    referenced.table()
                ))
            })?;

            if fk.columns.len() != referenced.columns().len() {
                return Err(Error::ForeignKeyReference(format!(
                    "{} on {} has {} columns but references {}",
                    fk.name,
                    table.name,
                    fk.columns.len(),
                    referenced.escaped()
                )));
            }

            for (local, remote) in fk.columns.iter().zip(referenced.columns()) {
                let local_column = table.column(local).ok_or_else(|| {
                    Error::ForeignKeyReference(format!(
                        "{} references unknown column {}.{}",
                        fk.name, table.name, local
                    ))
                })?;
                let remote_column = target.column(remote).ok_or_else(|| {
                    Error::ForeignKeyReference(format!(
                        "{} references unknown column {}.{}",
                        fk.name, target.name, remote
                    ))
                })?;
                if local_column.data_type.name != remote_column.data_type.name
                    || local_column.data_type.unsigned != remote_column.data_type.unsigned
                {
                    return Err(Error::ForeignKeyReference(format!(
                        "{}: {}.{} is {} but {}.{} is {}",
                        fk.name,
                        table.name,
                        local,
                        local_column.data_type,
                        target.name,
                        remote,
                        remote_column.data_type
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{Column, ForeignKey, View};

    fn table(name: &str, columns: &[(&str, &str)]) -> Table {
        let mut table = Table::new(name);
        for (column, data_type) in columns {
            table.add_column(Column::parse(column, data_type).unwrap());
        }
        table
    }

    #[test]
    fn groups_are_ordered_for_execution() {
        let mut from = DatabaseSchema::new(None);
        from.add_table(table("old", &[("id", "int")])).unwrap();
        from.add_table(table("kept", &[("id", "int")])).unwrap();
        from.add_view(View::new("gone", "SELECT 1")).unwrap();

        let mut to = DatabaseSchema::new(None);
        to.add_table(table("kept", &[("id", "bigint")])).unwrap();
        to.add_table(table("fresh", &[("id", "int"), ("name", "text")])).unwrap();
        to.add_view(View::new("shiny", "SELECT 1")).unwrap();

        let diff = SchemaDiff::generate(&from, &to, &DiffHints::default()).unwrap();
        let names: Vec<&str> = diff.iter().map(EntityDiff::entity_name).collect();
        assert_eq!(names, vec!["gone", "old", "kept", "fresh", "shiny"]);
    }

    fn users() -> Table {
        let mut users = table("users", &[("id", "int")]);
        users.set_primary_key(crate::schema::types::PrimaryKey::new(&["id"]));
        users
    }

    fn orders(references: Option<&str>) -> Table {
        let mut orders = table("orders", &[("id", "int"), ("user_id", "int")]);
        if let Some(referenced) = references {
            orders.add_foreign_key(ForeignKey::new("fk_user", &["user_id"], referenced, &["id"]));
        }
        orders
    }

    fn schema(tables: Vec<Table>) -> DatabaseSchema {
        let mut schema = DatabaseSchema::new(None);
        for table in tables {
            schema.add_table(table).unwrap();
        }
        schema
    }

    fn names(diff: &SchemaDiff) -> Vec<&str> {
        diff.iter().map(EntityDiff::entity_name).collect()
    }

    #[test]
    fn references_are_released_before_drop() {
        let from = schema(vec![users(), orders(Some("users"))]);
        let to = schema(vec![orders(None)]);

        let diff = SchemaDiff::generate(&from, &to, &DiffHints::default()).unwrap();
        assert_eq!(names(&diff), vec!["orders", "users"]);
        let statements = diff.statements();
        assert!(statements[0].starts_with("ALTER TABLE `orders` DROP FOREIGN KEY `fk_user`"));
        assert_eq!(statements.last().map(String::as_str), Some("DROP TABLE `users`"));

        let diff = SchemaDiff::generate(&from, &schema(Vec::new()), &DiffHints::default()).unwrap();
        assert_eq!(diff.statements(), vec!["DROP TABLE `orders`", "DROP TABLE `users`"]);
    }

    #[test]
    fn referenced_tables_are_created_first() {
        let mut people = users();
        people.name = "zusers".to_string();
        let mut orders = orders(Some("zusers"));
        orders.name = "aorders".to_string();

        let to = schema(vec![orders, people]);
        let diff = SchemaDiff::generate(&DatabaseSchema::new(None), &to, &DiffHints::default()).unwrap();
        assert_eq!(names(&diff), vec!["zusers", "aorders"]);
    }

    #[test]
    fn new_references_wait_for_created_tables() {
        let from = schema(vec![orders(None)]);
        let mut people = users();
        people.name = "people".to_string();
        let to = schema(vec![orders(Some("people")), people]);

        let diff = SchemaDiff::generate(&from, &to, &DiffHints::default()).unwrap();
        assert_eq!(names(&diff), vec!["people", "orders"]);
    }

    #[test]
    fn reference_cycles_keep_name_order() {
        let mut a = table("a", &[("id", "int"), ("b_id", "int")]);
        a.add_foreign_key(ForeignKey::new("fk_b", &["b_id"], "b", &["id"]));
        let mut b = table("b", &[("id", "int"), ("a_id", "int")]);
        b.add_foreign_key(ForeignKey::new("fk_a", &["a_id"], "a", &["id"]));

        let to = schema(vec![b, a]);
        let diff = SchemaDiff::generate(&DatabaseSchema::new(None), &to, &DiffHints::default()).unwrap();
        assert_eq!(names(&diff), vec!["a", "b"]);
    }

    #[test]
    fn identical_schemas_have_no_diff() {
        let mut schema = DatabaseSchema::new(None);
        schema.add_table(table("users", &[("id", "int")])).unwrap();
        schema.add_view(View::new("v", "SELECT id FROM users")).unwrap();

        let diff = SchemaDiff::generate(&schema, &schema.clone(), &DiffHints::default()).unwrap();
        assert!(diff.is_empty());
        assert!(diff.statements().is_empty());
    }

    #[test]
    fn strict_foreign_keys_need_matching_types() {
        let mut users = table("users", &[("id", "int unsigned")]);
        users.set_primary_key(crate::schema::types::PrimaryKey::new(&["id"]));
        let mut orders = table("orders", &[("id", "int"), ("user_id", "int")]);
        orders.add_foreign_key(ForeignKey::new("fk_user", &["user_id"], "users", &["id"]));

        let mut to = DatabaseSchema::new(None);
        to.add_table(users).unwrap();
        to.add_table(orders).unwrap();
        let from = DatabaseSchema::new(None);

        let result = SchemaDiff::generate(&from, &to, &DiffHints::default());
        assert!(matches!(result, Err(Error::ForeignKeyReference(_))));

        let hints = DiffHints::default().with_foreign_key_check(ForeignKeyCheckStrategy::Ignore);
        assert_eq!(SchemaDiff::generate(&from, &to, &hints).unwrap().len(), 2);
    }
}
