//! Loading schema snapshots and configuration from disk

use std::fs;

use pretty_assertions::assert_eq;
use rstest::*;
use tempfile::tempdir;

use schema_diff::config;
use schema_diff::hints::{ColumnRenameStrategy, TableRenameStrategy};
use schema_diff::schema::types::DatabaseSchema;
use schema_diff::{Error, SchemaDiff};

const USERS_JSON: &str = r#"{
  "tables": [
    {
      "name": "users",
      "columns": [
        { "name": "id", "data_type": "int", "nullable": false },
        { "name": "old_name", "data_type": "varchar(50)" }
      ],
      "primary_key": { "columns": ["id"] }
    }
  ],
  "views": [
    { "name": "user_names", "definition": "SELECT old_name FROM users" }
  ]
}"#;

const USERS_YAML: &str = r#"
tables:
  - name: users
    columns:
      - name: id
        data_type: int
        nullable: false
      - name: new_name
        data_type: varchar(50)
    primary_key:
      columns: [id]
views:
  - name: user_names
    definition: SELECT new_name FROM users
"#;

const USERS_TOML: &str = r#"
schema_name = "app"

[[tables]]
name = "users"
primary_key = { columns = ["id"] }
columns = [
  { name = "id", data_type = "int", nullable = false },
  { name = "old_name", data_type = "varchar(50)" },
]
"#;

#[rstest]
#[case("schema.json", USERS_JSON)]
#[case("schema.yaml", USERS_YAML)]
#[case("schema.toml", USERS_TOML)]
fn test_load_schema_formats(#[case] file_name: &str, #[case] content: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(file_name);
    fs::write(&path, content).unwrap();

    let schema = DatabaseSchema::load_from_file(&path).unwrap();
    let users = schema.tables.get("users").unwrap();
    assert_eq!(users.columns.len(), 2);
    assert!(!users.columns[0].nullable);
    assert_eq!(users.columns[1].data_type.to_string(), "varchar(50)");
}

#[test]
fn test_unknown_extension_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schema.sql");
    fs::write(&path, "CREATE TABLE t (id int)").unwrap();

    let result = DatabaseSchema::load_from_file(&path);
    assert!(matches!(result, Err(Error::SerializationError(_))));
}

#[test]
fn test_invalid_table_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schema.json");
    fs::write(&path, r#"{ "tables": [ { "name": "empty", "columns": [] } ] }"#).unwrap();

    let result = DatabaseSchema::load_from_file(&path);
    assert!(matches!(result, Err(Error::InvalidEntity(_))));
}

#[test]
fn test_config_drives_schema_diff() {
    let dir = tempdir().unwrap();
    let from_path = dir.path().join("from.json");
    let to_path = dir.path().join("to.yaml");
    let config_path = dir.path().join("schema_diff.toml");
    fs::write(&from_path, USERS_JSON).unwrap();
    fs::write(&to_path, USERS_YAML).unwrap();
    fs::write(
        &config_path,
        r#"
        [hints]
        column_rename = "heuristic_statement"
        table_rename = "heuristic_statement"

        [logging]
        level = "debug"
        format = "json"
        stdout = false
        "#,
    )
    .unwrap();

    let config = config::load_from_file(&config_path).unwrap();
    assert_eq!(config.hints.column_rename, ColumnRenameStrategy::HeuristicStatement);
    assert_eq!(config.hints.table_rename, TableRenameStrategy::HeuristicStatement);
    assert_eq!(config.logging.as_ref().map(|l| l.format.as_str()), Some("json"));

    let from = DatabaseSchema::load_from_file(&from_path).unwrap();
    let to = DatabaseSchema::load_from_file(&to_path).unwrap();
    let diff = SchemaDiff::generate(&from, &to, &config.hints).unwrap();

    assert_eq!(
        diff.statements(),
        vec![
            "ALTER TABLE `users` RENAME COLUMN `old_name` TO `new_name`",
            "ALTER VIEW `user_names` AS SELECT new_name FROM users",
        ]
    );
}

#[test]
fn test_missing_config_file() {
    let dir = tempdir().unwrap();
    let result = config::load_from_file(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(Error::ConfigError(_))));
}
