//! Schema module
//!
//! Schema object definitions, entity and schema comparison, DDL statement
//! rendering, instant DDL classification and annotated diffs.

pub mod annotations;
pub mod diff;
pub mod entity;
pub mod entity_diff;
pub mod instant;
pub mod statement;
mod table_diff;
pub mod types;
mod view_diff;

// Re-export key types
pub use annotations::{AnnotatedText, AnnotationType, TextualAnnotations};
pub use diff::SchemaDiff;
pub use entity::{Entity, EntityKind};
pub use entity_diff::EntityDiff;
pub use instant::InstantDdlCapability;
pub use statement::Statement;
pub use types::{
    CheckConstraint, Column, ColumnType, DatabaseSchema, ForeignKey, ForeignKeyTableColumns,
    Index, IndexKind, Partitioning, PrimaryKey, RangePartition, Table, TableOptions, View,
};
