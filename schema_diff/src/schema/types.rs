//! Type definitions for database schema objects

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::escape::{escape_id, escape_list};

/// Represents a complete database schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseSchema {
    pub tables: IndexMap<String, Table>,
    pub views: IndexMap<String, View>,
    pub schema_name: Option<String>,
}

/// On-disk layout of a schema snapshot
#[derive(Debug, Deserialize)]
struct SchemaDocument {
    schema_name: Option<String>,
    #[serde(default)]
    tables: Vec<Table>,
    #[serde(default)]
    views: Vec<View>,
}

impl DatabaseSchema {
    /// Create a new empty database schema
    pub fn new(schema_name: Option<String>) -> Self {
        Self {
            tables: IndexMap::new(),
            views: IndexMap::new(),
            schema_name,
        }
    }

    /// Load a schema snapshot from a JSON, TOML or YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let document: SchemaDocument = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| Error::SerializationError(e.to_string()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            other => {
                return Err(Error::SerializationError(format!(
                    "Unsupported schema file extension: {:?}",
                    other
                )))
            }
        };

        let mut schema = Self::new(document.schema_name);
        for table in document.tables {
            schema.add_table(table)?;
        }
        for view in document.views {
            schema.add_view(view)?;
        }

        tracing::debug!(
            path = %path.display(),
            tables = schema.tables.len(),
            views = schema.views.len(),
            "Loaded schema snapshot"
        );

        Ok(schema)
    }

    /// Add a table to the schema
    pub fn add_table(&mut self, table: Table) -> Result<()> {
        table.validate()?;
        self.ensure_name_free(&table.name)?;
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Add a view to the schema
    pub fn add_view(&mut self, view: View) -> Result<()> {
        view.validate()?;
        self.ensure_name_free(&view.name)?;
        self.views.insert(view.name.clone(), view);
        Ok(())
    }

    // Tables and views share one namespace
    fn ensure_name_free(&self, name: &str) -> Result<()> {
        if self.tables.contains_key(name) || self.views.contains_key(name) {
            return Err(Error::InvalidEntity(format!(
                "Duplicate entity name: {}",
                name
            )));
        }
        Ok(())
    }
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub qualifier: Option<String>,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub primary_key: Option<PrimaryKey>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub checks: Vec<CheckConstraint>,
    #[serde(default)]
    pub options: TableOptions,
    #[serde(default)]
    pub partitioning: Option<Partitioning>,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            qualifier: None,
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
            options: TableOptions::default(),
            partitioning: None,
        }
    }

    /// Set the schema qualifier of the table
    pub fn with_qualifier(mut self, qualifier: &str) -> Self {
        self.qualifier = Some(qualifier.to_string());
        self
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Set the primary key for the table
    pub fn set_primary_key(&mut self, pk: PrimaryKey) {
        self.primary_key = Some(pk);
    }

    /// Add an index to the table
    pub fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    /// Add a foreign key to the table
    pub fn add_foreign_key(&mut self, fk: ForeignKey) {
        self.foreign_keys.push(fk);
    }

    /// Add a check constraint to the table
    pub fn add_check(&mut self, check: CheckConstraint) {
        self.checks.push(check);
    }

    /// Find a column by name, case-insensitively
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether the column takes part in the primary key or any index
    pub fn is_column_indexed(&self, name: &str) -> bool {
        let in_pk = self
            .primary_key
            .as_ref()
            .map_or(false, |pk| contains_name(&pk.columns, name));
        in_pk || self.indexes.iter().any(|idx| contains_name(&idx.columns, name))
    }

    /// Check the structural invariants of the table
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidEntity("Table name cannot be empty".to_string()));
        }
        if self.columns.is_empty() {
            return Err(Error::InvalidEntity(format!(
                "Table {} must have at least one column",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(Error::InvalidEntity(format!(
                    "Table {} has a column without a name",
                    self.name
                )));
            }
            if !seen.insert(column.name.to_lowercase()) {
                return Err(Error::InvalidEntity(format!(
                    "Duplicate column {} in table {}",
                    column.name, self.name
                )));
            }
            if column.data_type.is_enum_or_set() && column.data_type.values.is_empty() {
                return Err(Error::InvalidEntity(format!(
                    "Column {}.{} declares no {} values",
                    self.name, column.name, column.data_type.name
                )));
            }
        }

        if let Some(pk) = &self.primary_key {
            self.validate_column_refs("primary key", &pk.columns)?;
        }

        let mut index_names = HashSet::new();
        for index in &self.indexes {
            if index.name.is_empty() || !index_names.insert(index.name.to_lowercase()) {
                return Err(Error::InvalidEntity(format!(
                    "Index names in table {} must be unique and non-empty",
                    self.name
                )));
            }
            self.validate_column_refs(&format!("index {}", index.name), &index.columns)?;
        }

        for fk in &self.foreign_keys {
            if fk.name.is_empty() || fk.ref_table.is_empty() {
                return Err(Error::InvalidEntity(format!(
                    "Foreign key in table {} needs a name and a referenced table",
                    self.name
                )));
            }
            self.validate_column_refs(&format!("foreign key {}", fk.name), &fk.columns)?;
            if fk.ref_columns.len() != fk.columns.len() {
                return Err(Error::InvalidEntity(format!(
                    "Foreign key {} references {} columns but declares {}",
                    fk.name,
                    fk.ref_columns.len(),
                    fk.columns.len()
                )));
            }
        }

        for check in &self.checks {
            if check.name.is_empty() || check.expression.trim().is_empty() {
                return Err(Error::InvalidEntity(format!(
                    "Check constraint in table {} needs a name and an expression",
                    self.name
                )));
            }
        }

        if let Some(partitioning) = &self.partitioning {
            let mut names = HashSet::new();
            if partitioning.partitions.is_empty() {
                return Err(Error::InvalidEntity(format!(
                    "Partitioning of table {} declares no partitions",
                    self.name
                )));
            }
            for partition in &partitioning.partitions {
                if !names.insert(partition.name.to_lowercase()) {
                    return Err(Error::InvalidEntity(format!(
                        "Duplicate partition {} in table {}",
                        partition.name, self.name
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_column_refs(&self, owner: &str, columns: &[String]) -> Result<()> {
        if columns.is_empty() {
            return Err(Error::InvalidEntity(format!(
                "The {} of table {} lists no columns",
                owner, self.name
            )));
        }
        for name in columns {
            if self.column(name).is_none() {
                return Err(Error::InvalidEntity(format!(
                    "The {} of table {} refers to unknown column {}",
                    owner, self.name, name
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn contains_name(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// Represents a database column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub collate: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// Create a new nullable column with the given name and type
    pub fn new(name: &str, data_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            nullable: true,
            default: None,
            auto_increment: false,
            charset: None,
            collate: None,
            comment: None,
        }
    }

    /// Create a column, parsing its type from text such as `varchar(50)`
    pub fn parse(name: &str, data_type: &str) -> Result<Self> {
        Ok(Self::new(name, data_type.parse()?))
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set a default value for the column
    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Mark the column as auto-increment
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Set the column comment
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// Whether two columns are defined identically, regardless of their names
    pub fn same_definition(&self, other: &Column) -> bool {
        self.data_type == other.data_type
            && self.nullable == other.nullable
            && self.default == other.default
            && self.auto_increment == other.auto_increment
            && self.charset == other.charset
            && self.collate == other.collate
            && self.comment == other.comment
    }
}

/// A column data type, e.g. `varchar(50)`, `int unsigned` or `enum('a','b')`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnType {
    /// Lowercase type name
    pub name: String,
    /// Length, precision or scale arguments
    pub args: Vec<String>,
    pub unsigned: bool,
    /// Values of an `enum` or `set`
    pub values: Vec<String>,
}

impl ColumnType {
    pub fn is_enum_or_set(&self) -> bool {
        self.name == "enum" || self.name == "set"
    }

    /// Declared length of a character or binary type
    pub fn length(&self) -> Option<u64> {
        match self.name.as_str() {
            "char" | "varchar" | "binary" | "varbinary" => {
                self.args.first().and_then(|arg| arg.parse().ok())
            }
            _ => None,
        }
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidEntity("Column type cannot be empty".to_string()));
        }

        let (head, inner, tail) = match s.find('(') {
            Some(open) => {
                let close = find_closing_paren(s, open).ok_or_else(|| {
                    Error::InvalidEntity(format!("Unbalanced parentheses in type {}", s))
                })?;
                (&s[..open], Some(&s[open + 1..close]), &s[close + 1..])
            }
            None => match s.split_once(char::is_whitespace) {
                Some((head, tail)) => (head, None, tail),
                None => (s, None, ""),
            },
        };

        let name = head.trim().to_lowercase();
        let mut column_type = ColumnType {
            name,
            args: Vec::new(),
            unsigned: false,
            values: Vec::new(),
        };

        if let Some(inner) = inner {
            if column_type.is_enum_or_set() {
                column_type.values = parse_quoted_values(inner)?;
            } else {
                column_type.args = inner
                    .split(',')
                    .map(|arg| arg.trim().to_string())
                    .filter(|arg| !arg.is_empty())
                    .collect();
            }
        }

        for modifier in tail.split_whitespace() {
            match modifier.to_lowercase().as_str() {
                "unsigned" => column_type.unsigned = true,
                "signed" => column_type.unsigned = false,
                other => {
                    return Err(Error::InvalidEntity(format!(
                        "Unsupported type modifier {} in {}",
                        other, s
                    )))
                }
            }
        }

        Ok(column_type)
    }
}

impl TryFrom<String> for ColumnType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.is_enum_or_set() {
            let values: Vec<String> = self
                .values
                .iter()
                .map(|v| format!("'{}'", v.replace('\'', "''")))
                .collect();
            write!(f, "({})", values.join(","))?;
        } else if !self.args.is_empty() {
            write!(f, "({})", self.args.join(","))?;
        }
        if self.unsigned {
            f.write_str(" unsigned")?;
        }
        Ok(())
    }
}

fn find_closing_paren(s: &str, open: usize) -> Option<usize> {
    let mut in_quote = false;
    for (i, c) in s[open + 1..].char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            ')' if !in_quote => return Some(open + 1 + i),
            _ => {}
        }
    }
    None
}

fn parse_quoted_values(inner: &str) -> Result<Vec<String>> {
    let malformed = || Error::InvalidEntity(format!("Malformed value list: {}", inner));
    let mut values = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.peek().map_or(false, |c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some('\'') => {}
            Some(_) => return Err(malformed()),
        }

        let mut value = String::new();
        loop {
            match chars.next() {
                None => return Err(malformed()),
                Some('\'') if chars.peek() == Some(&'\'') => {
                    chars.next();
                    value.push('\'');
                }
                Some('\'') => break,
                Some(c) => value.push(c),
            }
        }
        values.push(value);

        while chars.peek().map_or(false, |c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return Err(malformed()),
        }
    }

    Ok(values)
}

/// Represents a primary key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
}

impl PrimaryKey {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Kind of a secondary index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    #[default]
    Normal,
    Unique,
    FullText,
}

impl IndexKind {
    /// Keyword used in `KEY` definitions
    pub fn keyword(&self) -> &'static str {
        match self {
            IndexKind::Normal => "KEY",
            IndexKind::Unique => "UNIQUE KEY",
            IndexKind::FullText => "FULLTEXT KEY",
        }
    }
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub kind: IndexKind,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Index {
    pub fn new(name: &str, columns: &[&str], kind: IndexKind) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind,
            comment: None,
        }
    }
}

/// Represents a foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: Option<String>,
    #[serde(default)]
    pub on_update: Option<String>,
}

impl ForeignKey {
    pub fn new(name: &str, columns: &[&str], ref_table: &str, ref_columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ref_table: ref_table.to_string(),
            ref_columns: ref_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: None,
            on_update: None,
        }
    }

    /// The referenced side of the foreign key
    pub fn referenced(&self) -> ForeignKeyTableColumns {
        ForeignKeyTableColumns {
            table: self.ref_table.clone(),
            columns: self.ref_columns.clone(),
        }
    }
}

/// A referenced table and its ordered column list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKeyTableColumns {
    table: String,
    columns: Vec<String>,
}

impl ForeignKeyTableColumns {
    pub fn new(table: &str, columns: Vec<String>) -> Result<Self> {
        if table.is_empty() {
            return Err(Error::InvalidEntity(
                "Foreign key reference needs a table".to_string(),
            ));
        }
        if columns.is_empty() {
            return Err(Error::InvalidEntity(format!(
                "Foreign key reference to {} needs at least one column",
                table
            )));
        }
        Ok(Self {
            table: table.to_string(),
            columns,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Render as `` `table` (`col1`, `col2`) ``
    pub fn escaped(&self) -> String {
        format!("{} ({})", escape_id(&self.table), escape_list(&self.columns))
    }
}

/// Represents a check constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: String,
    pub expression: String,
    #[serde(default = "default_enforced")]
    pub enforced: bool,
}

fn default_enforced() -> bool {
    true
}

impl CheckConstraint {
    pub fn new(name: &str, expression: &str) -> Self {
        Self {
            name: name.to_string(),
            expression: expression.to_string(),
            enforced: true,
        }
    }
}

/// Table-level options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub collate: Option<String>,
    #[serde(default)]
    pub auto_increment: Option<u64>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// `PARTITION BY RANGE` definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partitioning {
    /// The partitioning expression, e.g. `id` or `TO_DAYS(created_at)`
    pub expression: String,
    pub partitions: Vec<RangePartition>,
}

/// A single range partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangePartition {
    pub name: String,
    pub less_than: String,
}

impl RangePartition {
    pub fn new(name: &str, less_than: &str) -> Self {
        Self {
            name: name.to_string(),
            less_than: less_than.to_string(),
        }
    }
}

/// Represents a database view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    #[serde(default)]
    pub qualifier: Option<String>,
    /// Explicit column list, if declared
    #[serde(default)]
    pub columns: Vec<String>,
    pub definition: String,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub security: Option<String>,
}

impl View {
    /// Create a new view with the given name and select body
    pub fn new(name: &str, definition: &str) -> Self {
        Self {
            name: name.to_string(),
            qualifier: None,
            columns: Vec::new(),
            definition: definition.to_string(),
            algorithm: None,
            security: None,
        }
    }

    /// Check the structural invariants of the view
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidEntity("View name cannot be empty".to_string()));
        }
        if self.definition.trim().is_empty() {
            return Err(Error::InvalidEntity(format!(
                "View {} has an empty definition",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.is_empty() || !seen.insert(column.to_lowercase()) {
                return Err(Error::InvalidEntity(format!(
                    "View {} declares an empty or duplicate column name",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_column_types() {
        let t: ColumnType = "VARCHAR(50)".parse().unwrap();
        assert_eq!(t.name, "varchar");
        assert_eq!(t.length(), Some(50));
        assert_eq!(t.to_string(), "varchar(50)");

        let t: ColumnType = "int unsigned".parse().unwrap();
        assert!(t.unsigned);
        assert_eq!(t.to_string(), "int unsigned");

        let t: ColumnType = "decimal(10, 2)".parse().unwrap();
        assert_eq!(t.args, vec!["10", "2"]);
        assert_eq!(t.to_string(), "decimal(10,2)");

        let t: ColumnType = "enum('a', 'b,c', 'it''s')".parse().unwrap();
        assert_eq!(t.values, vec!["a", "b,c", "it's"]);
        assert_eq!(t.to_string(), "enum('a','b,c','it''s')");
    }

    #[test]
    fn rejects_malformed_types() {
        assert!("".parse::<ColumnType>().is_err());
        assert!("varchar(50".parse::<ColumnType>().is_err());
        assert!("enum('a".parse::<ColumnType>().is_err());
        assert!("int zerofill".parse::<ColumnType>().is_err());
    }

    #[test]
    fn foreign_key_reference_requires_columns() {
        assert!(ForeignKeyTableColumns::new("orders", vec![]).is_err());

        let reference = ForeignKeyTableColumns::new(
            "orders",
            vec!["user_id".to_string(), "tenant_id".to_string()],
        )
        .unwrap();
        assert_eq!(reference.escaped(), "`orders` (`user_id`, `tenant_id`)");
    }

    #[test]
    fn validates_tables() {
        let mut table = Table::new("t");
        assert!(table.validate().is_err());

        table.add_column(Column::parse("id", "int").unwrap());
        table.set_primary_key(PrimaryKey::new(&["id"]));
        assert!(table.validate().is_ok());

        table.add_index(Index::new("idx_missing", &["missing"], IndexKind::Normal));
        assert!(matches!(table.validate(), Err(Error::InvalidEntity(_))));
    }

    #[test]
    fn schema_rejects_duplicate_names() {
        let mut schema = DatabaseSchema::new(None);
        let mut table = Table::new("t");
        table.add_column(Column::parse("id", "int").unwrap());
        schema.add_table(table).unwrap();
        assert!(schema.add_view(View::new("t", "select 1")).is_err());
    }
}
