//! Instant DDL classification
//!
//! Decides whether the change described by a diff could run with
//! `ALGORITHM=INSTANT`, i.e. without rebuilding the table.

use serde::Serialize;
use std::fmt;

use crate::hints::{AlterTableAlgorithmStrategy, DiffHints};
use crate::schema::entity::Entity;
use crate::schema::statement::{AlterSpec, AlterTable, ColumnPosition, Statement, TableOptionChange};
use crate::schema::types::{Column, ColumnType, Table};

/// The ability of a diff to run as instant DDL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstantDdlCapability {
    /// Not evaluated yet
    #[default]
    Unknown,
    /// The diff is empty or is not an `ALTER TABLE`
    Irrelevant,
    Impossible,
    Possible,
}

impl fmt::Display for InstantDdlCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstantDdlCapability::Unknown => "unknown",
            InstantDdlCapability::Irrelevant => "irrelevant",
            InstantDdlCapability::Impossible => "impossible",
            InstantDdlCapability::Possible => "possible",
        };
        f.write_str(label)
    }
}

/// Classify a statement against the table it applies to
pub fn classify(
    statement: Option<&Statement>,
    from: Option<&Entity>,
    hints: &DiffHints,
) -> InstantDdlCapability {
    let alter = match statement {
        Some(Statement::AlterTable(alter)) => alter,
        _ => return InstantDdlCapability::Irrelevant,
    };
    if alter.is_empty() {
        return InstantDdlCapability::Irrelevant;
    }

    match hints.alter_table_algorithm {
        AlterTableAlgorithmStrategy::Inplace | AlterTableAlgorithmStrategy::Copy => {
            return InstantDdlCapability::Impossible
        }
        AlterTableAlgorithmStrategy::None | AlterTableAlgorithmStrategy::Instant => {}
    }

    let table = match from {
        Some(Entity::Table(table)) => table,
        _ => return InstantDdlCapability::Impossible,
    };

    if alter_is_instant(alter, table) {
        InstantDdlCapability::Possible
    } else {
        InstantDdlCapability::Impossible
    }
}

fn alter_is_instant(alter: &AlterTable, table: &Table) -> bool {
    if alter.partition.is_some() {
        return false;
    }
    alter.specs.iter().all(|spec| spec_is_instant(spec, table))
}

fn spec_is_instant(spec: &AlterSpec, table: &Table) -> bool {
    match spec {
        AlterSpec::AddColumn { column, .. } => !column.auto_increment,
        AlterSpec::DropColumn(name) => !table.is_column_indexed(name),
        AlterSpec::RenameColumn { .. } => true,
        AlterSpec::ModifyColumn { column, position } => {
            position_is_instant(position)
                && table
                    .column(&column.name)
                    .map_or(false, |source| modification_is_instant(source, column))
        }
        AlterSpec::ChangeColumn {
            from,
            column,
            position,
        } => {
            position_is_instant(position)
                && table
                    .column(from)
                    .map_or(false, |source| modification_is_instant(source, column))
        }
        AlterSpec::TableOption(TableOptionChange::AutoIncrement(_))
        | AlterSpec::TableOption(TableOptionChange::Comment(_)) => true,
        AlterSpec::TableOption(_)
        | AlterSpec::AddIndex(_)
        | AlterSpec::DropIndex(_)
        | AlterSpec::AddPrimaryKey(_)
        | AlterSpec::DropPrimaryKey
        | AlterSpec::AddForeignKey(_)
        | AlterSpec::DropForeignKey(_)
        | AlterSpec::AddCheck(_)
        | AlterSpec::DropCheck(_) => false,
    }
}

// Reordering existing columns rebuilds the table
fn position_is_instant(position: &ColumnPosition) -> bool {
    matches!(position, ColumnPosition::Unchanged)
}

fn modification_is_instant(source: &Column, target: &Column) -> bool {
    // Everything but default, comment and type must stay as is
    let mut rest = source.clone();
    rest.name = target.name.clone();
    rest.default = target.default.clone();
    rest.comment = target.comment.clone();
    rest.data_type = target.data_type.clone();
    if rest != *target {
        return false;
    }

    source.data_type == target.data_type || type_change_is_instant(&source.data_type, &target.data_type)
}

fn type_change_is_instant(from: &ColumnType, to: &ColumnType) -> bool {
    if from.name != to.name || from.unsigned != to.unsigned {
        return false;
    }
    match from.name.as_str() {
        "varchar" | "varbinary" => match (from.length(), to.length()) {
            // Widening within the same length-prefix size
            (Some(old), Some(new)) => new > old && (old <= 255) == (new <= 255),
            _ => false,
        },
        "enum" => values_appended(from, to) && (from.values.len() <= 255) == (to.values.len() <= 255),
        "set" => values_appended(from, to) && (from.values.len() + 7) / 8 == (to.values.len() + 7) / 8,
        _ => false,
    }
}

fn values_appended(from: &ColumnType, to: &ColumnType) -> bool {
    to.values.len() > from.values.len() && to.values.starts_with(&from.values)
}
