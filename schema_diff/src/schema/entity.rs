//! Diffable schema entities
//!
//! An `Entity` is a table or a view. Entities of the same kind can be diffed
//! against each other; diffing a table against a view is an error.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::hints::DiffHints;
use crate::schema::entity_diff::EntityDiff;
use crate::schema::statement::{Statement, TableName};
use crate::schema::types::{Table, View};
use crate::schema::{table_diff, view_diff};

/// The kind of a schema entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Table,
    View,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Table => f.write_str("table"),
            EntityKind::View => f.write_str("view"),
        }
    }
}

/// A database object that can be diffed
///
/// `Entity::table`, `Entity::view`, `TryFrom` and deserialization validate
/// the definition. Building a variant directly skips validation, so the
/// diff of such an entity may not be valid SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", try_from = "UncheckedEntity")]
pub enum Entity {
    Table(Table),
    View(View),
}

/// Wire form of `Entity` before validation
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum UncheckedEntity {
    Table(Table),
    View(View),
}

impl TryFrom<UncheckedEntity> for Entity {
    type Error = Error;

    fn try_from(entity: UncheckedEntity) -> Result<Self> {
        match entity {
            UncheckedEntity::Table(table) => Entity::table(table),
            UncheckedEntity::View(view) => Entity::view(view),
        }
    }
}

impl TryFrom<Table> for Entity {
    type Error = Error;

    fn try_from(table: Table) -> Result<Self> {
        Entity::table(table)
    }
}

impl TryFrom<View> for Entity {
    type Error = Error;

    fn try_from(view: View) -> Result<Self> {
        Entity::view(view)
    }
}

impl Entity {
    /// Validate and wrap a table
    pub fn table(table: Table) -> Result<Self> {
        table.validate()?;
        Ok(Entity::Table(table))
    }

    /// Validate and wrap a view
    pub fn view(view: View) -> Result<Self> {
        view.validate()?;
        Ok(Entity::View(view))
    }

    /// Name of the entity
    pub fn name(&self) -> &str {
        match self {
            Entity::Table(table) => &table.name,
            Entity::View(view) => &view.name,
        }
    }

    /// Declared schema qualifier, if any
    pub fn qualifier(&self) -> Option<&str> {
        match self {
            Entity::Table(table) => table.qualifier.as_deref(),
            Entity::View(view) => view.qualifier.as_deref(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Table(_) => EntityKind::Table,
            Entity::View(_) => EntityKind::View,
        }
    }

    /// Diff this entity against another of the same kind. The diff goes
    /// from this entity to `other`.
    pub fn diff(&self, other: &Entity, hints: &DiffHints) -> Result<EntityDiff> {
        let diff = match (self, other) {
            (Entity::Table(from), Entity::Table(to)) => table_diff::diff_tables(from, to, hints)?,
            (Entity::View(from), Entity::View(to)) => view_diff::diff_views(from, to, hints)?,
            _ => {
                return Err(Error::MismatchedKind {
                    from: format!("{} {}", self.kind(), self.name()),
                    to: format!("{} {}", other.kind(), other.name()),
                })
            }
        };

        tracing::debug!(
            entity = self.name(),
            kind = %self.kind(),
            statements = diff.chain_len(),
            "Computed entity diff"
        );
        Ok(diff)
    }

    /// A diff creating this entity from nothing
    pub fn create(&self) -> EntityDiff {
        self.create_with_hints(&DiffHints::default())
    }

    /// A diff creating this entity, rendered under the given hints
    pub fn create_with_hints(&self, hints: &DiffHints) -> EntityDiff {
        let name = TableName::resolve(self.name(), self.qualifier(), hints);
        let statement = match self {
            Entity::Table(table) => Statement::CreateTable {
                name,
                table: table.clone(),
            },
            Entity::View(view) => Statement::CreateView {
                name,
                view: view.clone(),
            },
        };
        EntityDiff::created(self.clone(), statement, hints)
    }

    /// A diff dropping this entity
    pub fn drop(&self) -> EntityDiff {
        self.drop_with_hints(&DiffHints::default())
    }

    /// A diff dropping this entity, rendered under the given hints
    pub fn drop_with_hints(&self, hints: &DiffHints) -> EntityDiff {
        let name = TableName::resolve(self.name(), self.qualifier(), hints);
        let statement = match self {
            Entity::Table(_) => Statement::DropTable(name),
            Entity::View(_) => Statement::DropView(name),
        };
        EntityDiff::dropped(self.clone(), statement, hints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::Column;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserialize_validates() {
        let empty = serde_json::from_str::<Entity>(r#"{"kind":"table","name":"t","columns":[]}"#);
        assert!(empty.is_err());

        let view = serde_json::from_str::<Entity>(r#"{"kind":"view","name":"v","definition":""}"#);
        assert!(view.is_err());

        let table = serde_json::from_str::<Entity>(
            r#"{"kind":"table","name":"t","columns":[{"name":"id","data_type":"int"}]}"#,
        )
        .unwrap();
        assert_eq!(table.kind(), EntityKind::Table);
        assert_eq!(table.name(), "t");
    }

    #[test]
    fn serialized_entities_read_back() {
        let mut table = Table::new("t");
        table.add_column(Column::parse("id", "int").unwrap());
        let entity = Entity::try_from(table).unwrap();

        let json = serde_json::to_string(&entity).unwrap();
        assert!(json.contains(r#""kind":"table""#));
        assert_eq!(serde_json::from_str::<Entity>(&json).unwrap(), entity);

        assert!(Entity::try_from(Table::new("empty")).is_err());
    }
}
