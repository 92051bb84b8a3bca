//! Error types for schema_diff

use thiserror::Error;

/// Result type for schema_diff operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for schema_diff
#[derive(Error, Debug)]
pub enum Error {
    #[error("Mismatched entity kinds: cannot diff {from} against {to}")]
    MismatchedKind { from: String, to: String },

    #[error("Subsequent diffs rejected: {entity} requires {statements} statements")]
    SubsequentDiffRejected { entity: String, statements: usize },

    #[error("Enum value ordinal changed in {table}.{column}")]
    EnumValueOrdinalChanged { table: String, column: String },

    #[error("Foreign key reference error: {0}")]
    ForeignKeyReference(String),

    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convert Serde JSON errors to schema_diff errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert YAML errors to schema_diff errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to schema_diff errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
