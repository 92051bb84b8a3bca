//! schema_diff: policy-driven structural diffs of tables and views
//!
//! Given two versions of a schema entity, schema_diff computes the DDL
//! statements that turn the first into the second. Every ambiguity along the
//! way (renames, partition rotation, generated constraint names, ...) is
//! resolved by [`DiffHints`]. Diffs needing several statements are chained,
//! and `ALTER TABLE` diffs can be classified for instant DDL.

pub mod config;
pub mod error;
pub mod hints;
pub mod schema;
pub mod utils;

// Re-export main types for easier access
pub use config::Config;
pub use error::{Error, Result};
pub use hints::DiffHints;
pub use schema::annotations::{AnnotationType, TextualAnnotations};
pub use schema::diff::SchemaDiff;
pub use schema::entity::{Entity, EntityKind};
pub use schema::entity_diff::EntityDiff;
pub use schema::instant::InstantDdlCapability;
