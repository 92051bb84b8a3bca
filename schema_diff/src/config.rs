//! Configuration handling for schema_diff

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::hints::DiffHints;

/// Load configuration from a TOML file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e)))?;

    config_str.parse()
}

/// Represents the complete schema_diff configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Policy applied to every diff
    #[serde(default)]
    pub hints: DiffHints,
    pub logging: Option<LoggingConfig>,
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))
    }
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    pub file: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_stdout")]
    pub stdout: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_stdout() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            format: default_format(),
            stdout: default_stdout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::{ColumnRenameStrategy, SubsequentDiffStrategy};

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parses_hints_and_logging() {
        let config: Config = r#"
            [hints]
            column_rename = "heuristic_statement"
            subsequent_diff = "reject"

            [logging]
            level = "debug"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.hints.column_rename, ColumnRenameStrategy::HeuristicStatement);
        assert_eq!(config.hints.subsequent_diff, SubsequentDiffStrategy::Reject);
        let logging = config.logging.unwrap();
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, "text");
        assert!(logging.stdout);
    }

    #[test]
    fn unknown_strategy_is_a_config_error() {
        let result: Result<Config> = "[hints]\ncolumn_rename = \"guess\"".parse();
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }
}
