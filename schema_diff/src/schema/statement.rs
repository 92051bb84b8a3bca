//! DDL statements produced by diffs
//!
//! A `Statement` is the abstract form of a change. It renders either as
//! human-friendly SQL (`to_sql`) or as canonical single-line SQL
//! (`to_canonical_sql`), in which whitespace is collapsed and `ALTER TABLE`
//! specs are put in a fixed order so that equivalent diffs compare equal.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::hints::{AlterTableAlgorithmStrategy, DiffHints, TableQualifierHint};
use crate::schema::types::{
    CheckConstraint, Column, ForeignKey, Index, Partitioning, PrimaryKey, RangePartition, Table,
    View,
};
use crate::utils::escape::{escape_id, escape_list, escape_qualified, quote_literal};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapse runs of whitespace and trim
pub(crate) fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// A possibly qualified table or view name as rendered in statements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub qualifier: Option<String>,
    pub name: String,
}

impl TableName {
    /// Name of an entity, qualified only when the hints ask for declared qualifiers
    pub fn resolve(name: &str, qualifier: Option<&str>, hints: &DiffHints) -> Self {
        let qualifier = match hints.table_qualifier {
            TableQualifierHint::Default => None,
            TableQualifierHint::Declared => qualifier.map(str::to_string),
        };
        Self {
            qualifier,
            name: name.to_string(),
        }
    }

    pub fn escaped(&self) -> String {
        escape_qualified(self.qualifier.as_deref(), &self.name)
    }
}

/// Where a column lands when added or modified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    /// End of the table for additions, unchanged for modifications
    Unchanged,
    First,
    After(String),
}

impl ColumnPosition {
    fn render(&self) -> String {
        match self {
            ColumnPosition::Unchanged => String::new(),
            ColumnPosition::First => " FIRST".to_string(),
            ColumnPosition::After(name) => format!(" AFTER {}", escape_id(name)),
        }
    }
}

/// A table option set by `ALTER TABLE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOptionChange {
    Engine(String),
    Charset(String),
    Collate(String),
    AutoIncrement(u64),
    Comment(String),
}

/// One clause of an `ALTER TABLE` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterSpec {
    AddColumn { column: Column, position: ColumnPosition },
    DropColumn(String),
    ModifyColumn { column: Column, position: ColumnPosition },
    /// Rename and redefine in one clause
    ChangeColumn { from: String, column: Column, position: ColumnPosition },
    RenameColumn { from: String, to: String },
    AddIndex(Index),
    DropIndex(String),
    AddPrimaryKey(PrimaryKey),
    DropPrimaryKey,
    AddForeignKey(ForeignKey),
    DropForeignKey(String),
    AddCheck(CheckConstraint),
    DropCheck(String),
    TableOption(TableOptionChange),
}

impl AlterSpec {
    // Drops first, then renames, then column additions and moves in the
    // order they were produced, then keys and options
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            AlterSpec::DropForeignKey(_) => 0,
            AlterSpec::DropCheck(_) => 1,
            AlterSpec::DropIndex(_) => 2,
            AlterSpec::DropPrimaryKey => 3,
            AlterSpec::DropColumn(_) => 4,
            AlterSpec::RenameColumn { .. } => 5,
            AlterSpec::ChangeColumn { .. } => 6,
            AlterSpec::ModifyColumn { .. } => 6,
            AlterSpec::AddColumn { .. } => 6,
            AlterSpec::AddPrimaryKey(_) => 8,
            AlterSpec::AddIndex(_) => 9,
            AlterSpec::AddCheck(_) => 10,
            AlterSpec::AddForeignKey(_) => 11,
            AlterSpec::TableOption(_) => 12,
        }
    }

    // Column additions and modifications may depend on each other's
    // positions, so only the other specs are ordered by name.
    fn sort_name(&self) -> String {
        match self {
            AlterSpec::DropForeignKey(name)
            | AlterSpec::DropCheck(name)
            | AlterSpec::DropIndex(name)
            | AlterSpec::DropColumn(name) => name.to_lowercase(),
            AlterSpec::RenameColumn { from, .. } => from.to_lowercase(),
            AlterSpec::AddIndex(index) => index.name.to_lowercase(),
            AlterSpec::AddCheck(check) => check.name.to_lowercase(),
            AlterSpec::AddForeignKey(fk) => fk.name.to_lowercase(),
            _ => String::new(),
        }
    }

    fn render(&self, canonical: bool) -> String {
        match self {
            AlterSpec::AddColumn { column, position } => format!(
                "ADD COLUMN {}{}",
                column_definition(column, canonical),
                position.render()
            ),
            AlterSpec::DropColumn(name) => format!("DROP COLUMN {}", escape_id(name)),
            AlterSpec::ModifyColumn { column, position } => format!(
                "MODIFY COLUMN {}{}",
                column_definition(column, canonical),
                position.render()
            ),
            AlterSpec::ChangeColumn {
                from,
                column,
                position,
            } => format!(
                "CHANGE COLUMN {} {}{}",
                escape_id(from),
                column_definition(column, canonical),
                position.render()
            ),
            AlterSpec::RenameColumn { from, to } => {
                format!("RENAME COLUMN {} TO {}", escape_id(from), escape_id(to))
            }
            AlterSpec::AddIndex(index) => format!("ADD {}", index_definition(index, canonical)),
            AlterSpec::DropIndex(name) => format!("DROP KEY {}", escape_id(name)),
            AlterSpec::AddPrimaryKey(pk) => format!("ADD {}", primary_key_definition(pk)),
            AlterSpec::DropPrimaryKey => "DROP PRIMARY KEY".to_string(),
            AlterSpec::AddForeignKey(fk) => format!("ADD {}", foreign_key_definition(fk)),
            AlterSpec::DropForeignKey(name) => format!("DROP FOREIGN KEY {}", escape_id(name)),
            AlterSpec::AddCheck(check) => format!("ADD {}", check_definition(check, canonical)),
            AlterSpec::DropCheck(name) => format!("DROP CHECK {}", escape_id(name)),
            AlterSpec::TableOption(option) => match option {
                TableOptionChange::Engine(engine) => format!("ENGINE {}", engine),
                TableOptionChange::Charset(charset) => format!("CHARSET {}", charset),
                TableOptionChange::Collate(collate) => format!("COLLATE {}", collate),
                TableOptionChange::AutoIncrement(value) => format!("AUTO_INCREMENT {}", value),
                TableOptionChange::Comment(comment) => {
                    format!("COMMENT {}", quote_literal(comment))
                }
            },
        }
    }
}

/// A partitioning change carried by an `ALTER TABLE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionSpec {
    Drop(Vec<String>),
    Add(RangePartition),
    /// Full `PARTITION BY` re-specification
    Full(Partitioning),
    Remove,
}

impl PartitionSpec {
    fn render(&self, canonical: bool) -> String {
        match self {
            PartitionSpec::Drop(names) => format!("DROP PARTITION {}", escape_list(names)),
            PartitionSpec::Add(partition) => {
                format!("ADD PARTITION ({})", partition_definition(partition))
            }
            PartitionSpec::Full(partitioning) => partitioning_definition(partitioning, canonical),
            PartitionSpec::Remove => "REMOVE PARTITIONING".to_string(),
        }
    }
}

/// An `ALTER TABLE` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterTable {
    pub table: TableName,
    pub specs: Vec<AlterSpec>,
    pub algorithm: AlterTableAlgorithmStrategy,
    pub partition: Option<PartitionSpec>,
}

impl AlterTable {
    pub fn new(table: TableName, algorithm: AlterTableAlgorithmStrategy) -> Self {
        Self {
            table,
            specs: Vec::new(),
            algorithm,
            partition: None,
        }
    }

    /// Whether the statement changes anything
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty() && self.partition.is_none()
    }

    fn render(&self, canonical: bool) -> String {
        let mut specs = self.specs.clone();
        if canonical {
            specs.sort_by_key(|spec| (spec.precedence(), spec.sort_name()));
        }

        let mut clauses: Vec<String> = specs.iter().map(|spec| spec.render(canonical)).collect();
        if let Some(keyword) = self.algorithm.keyword() {
            clauses.push(format!("ALGORITHM = {}", keyword));
        }

        let mut sql = format!("ALTER TABLE {}", self.table.escaped());
        if !clauses.is_empty() {
            sql.push(' ');
            sql.push_str(&clauses.join(", "));
        }
        if let Some(partition) = &self.partition {
            sql.push(' ');
            sql.push_str(&partition.render(canonical));
        }
        sql
    }
}

/// A DDL statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateTable { name: TableName, table: Table },
    DropTable(TableName),
    RenameTable { from: TableName, to: TableName },
    AlterTable(AlterTable),
    CreateView { name: TableName, view: View },
    AlterView { name: TableName, view: View },
    DropView(TableName),
}

impl Statement {
    /// Human-friendly rendering
    pub fn to_sql(&self) -> String {
        self.render(false)
    }

    /// Canonical single-line rendering
    pub fn to_canonical_sql(&self) -> String {
        self.render(true)
    }

    fn render(&self, canonical: bool) -> String {
        match self {
            Statement::CreateTable { name, table } => create_table_sql(name, table, canonical),
            Statement::DropTable(name) => format!("DROP TABLE {}", name.escaped()),
            Statement::RenameTable { from, to } => {
                format!("RENAME TABLE {} TO {}", from.escaped(), to.escaped())
            }
            Statement::AlterTable(alter) => alter.render(canonical),
            Statement::CreateView { name, view } => view_sql("CREATE", name, view, canonical),
            Statement::AlterView { name, view } => view_sql("ALTER", name, view, canonical),
            Statement::DropView(name) => format!("DROP VIEW {}", name.escaped()),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

fn text(value: &str, canonical: bool) -> String {
    if canonical {
        normalize_whitespace(value)
    } else {
        value.to_string()
    }
}

/// Render a column definition as used in `CREATE TABLE` and `ALTER TABLE`
pub(crate) fn column_definition(column: &Column, canonical: bool) -> String {
    let mut def = format!("{} {}", escape_id(&column.name), column.data_type);
    if let Some(charset) = &column.charset {
        def.push_str(&format!(" CHARACTER SET {}", charset));
    }
    if let Some(collate) = &column.collate {
        def.push_str(&format!(" COLLATE {}", collate));
    }
    if !column.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        def.push_str(&format!(" DEFAULT {}", text(default, canonical)));
    }
    if column.auto_increment {
        def.push_str(" AUTO_INCREMENT");
    }
    if let Some(comment) = &column.comment {
        def.push_str(&format!(" COMMENT {}", quote_literal(comment)));
    }
    def
}

fn index_definition(index: &Index, canonical: bool) -> String {
    let mut def = format!(
        "{} {} ({})",
        index.kind.keyword(),
        escape_id(&index.name),
        escape_list(&index.columns)
    );
    if let Some(comment) = &index.comment {
        def.push_str(&format!(" COMMENT {}", quote_literal(&text(comment, canonical))));
    }
    def
}

fn primary_key_definition(pk: &PrimaryKey) -> String {
    format!("PRIMARY KEY ({})", escape_list(&pk.columns))
}

fn foreign_key_definition(fk: &ForeignKey) -> String {
    let mut def = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}",
        escape_id(&fk.name),
        escape_list(&fk.columns),
        fk.referenced().escaped()
    );
    if let Some(action) = &fk.on_delete {
        def.push_str(&format!(" ON DELETE {}", action.to_uppercase()));
    }
    if let Some(action) = &fk.on_update {
        def.push_str(&format!(" ON UPDATE {}", action.to_uppercase()));
    }
    def
}

fn check_definition(check: &CheckConstraint, canonical: bool) -> String {
    let mut def = format!(
        "CONSTRAINT {} CHECK ({})",
        escape_id(&check.name),
        text(&check.expression, canonical)
    );
    if !check.enforced {
        def.push_str(" NOT ENFORCED");
    }
    def
}

fn partition_definition(partition: &RangePartition) -> String {
    format!(
        "PARTITION {} VALUES LESS THAN ({})",
        escape_id(&partition.name),
        partition.less_than
    )
}

fn partitioning_definition(partitioning: &Partitioning, canonical: bool) -> String {
    let partitions: Vec<String> = partitioning
        .partitions
        .iter()
        .map(partition_definition)
        .collect();
    let expression = text(&partitioning.expression, canonical);
    if canonical {
        format!(
            "PARTITION BY RANGE ({}) ({})",
            expression,
            partitions.join(", ")
        )
    } else {
        format!(
            "PARTITION BY RANGE ({})\n({})",
            expression,
            partitions.join(",\n ")
        )
    }
}

fn create_table_sql(name: &TableName, table: &Table, canonical: bool) -> String {
    let mut definitions: Vec<String> = table
        .columns
        .iter()
        .map(|column| column_definition(column, canonical))
        .collect();

    if let Some(pk) = &table.primary_key {
        definitions.push(primary_key_definition(pk));
    }
    for index in &table.indexes {
        definitions.push(index_definition(index, canonical));
    }
    for fk in &table.foreign_keys {
        definitions.push(foreign_key_definition(fk));
    }
    for check in &table.checks {
        definitions.push(check_definition(check, canonical));
    }

    let mut options = Vec::new();
    if let Some(engine) = &table.options.engine {
        options.push(format!("ENGINE {}", engine));
    }
    if let Some(auto_increment) = table.options.auto_increment {
        options.push(format!("AUTO_INCREMENT {}", auto_increment));
    }
    if let Some(charset) = &table.options.charset {
        options.push(format!("CHARSET {}", charset));
    }
    if let Some(collate) = &table.options.collate {
        options.push(format!("COLLATE {}", collate));
    }
    if let Some(comment) = &table.options.comment {
        options.push(format!("COMMENT {}", quote_literal(comment)));
    }

    let mut sql = if canonical {
        format!("CREATE TABLE {} ({})", name.escaped(), definitions.join(", "))
    } else {
        format!(
            "CREATE TABLE {} (\n  {}\n)",
            name.escaped(),
            definitions.join(",\n  ")
        )
    };
    if !options.is_empty() {
        sql.push(' ');
        sql.push_str(&options.join(" "));
    }
    if let Some(partitioning) = &table.partitioning {
        sql.push(if canonical { ' ' } else { '\n' });
        sql.push_str(&partitioning_definition(partitioning, canonical));
    }
    sql
}

fn view_sql(verb: &str, name: &TableName, view: &View, canonical: bool) -> String {
    let mut sql = verb.to_string();
    if let Some(algorithm) = &view.algorithm {
        sql.push_str(&format!(" ALGORITHM = {}", algorithm.to_uppercase()));
    }
    if let Some(security) = &view.security {
        sql.push_str(&format!(" SQL SECURITY {}", security.to_uppercase()));
    }
    sql.push_str(&format!(" VIEW {}", name.escaped()));
    if !view.columns.is_empty() {
        sql.push_str(&format!("({})", escape_list(&view.columns)));
    }
    sql.push_str(" AS ");
    sql.push_str(&text(view.definition.trim(), canonical));
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        let mut table = Table::new("users");
        table.add_column(Column::parse("id", "int").unwrap().nullable(false));
        table.add_column(Column::parse("email", "varchar(255)").unwrap());
        table.set_primary_key(PrimaryKey::new(&["id"]));
        table
    }

    #[test]
    fn renders_create_table() {
        let statement = Statement::CreateTable {
            name: TableName::resolve("users", None, &DiffHints::default()),
            table: users(),
        };

        assert_eq!(
            statement.to_sql(),
            "CREATE TABLE `users` (\n  `id` int NOT NULL,\n  `email` varchar(255),\n  PRIMARY KEY (`id`)\n)"
        );
        assert_eq!(
            statement.to_canonical_sql(),
            "CREATE TABLE `users` (`id` int NOT NULL, `email` varchar(255), PRIMARY KEY (`id`))"
        );
    }

    #[test]
    fn canonical_alter_orders_specs() {
        let mut alter = AlterTable::new(
            TableName {
                qualifier: Some("shop".to_string()),
                name: "users".to_string(),
            },
            AlterTableAlgorithmStrategy::Instant,
        );
        alter.specs.push(AlterSpec::AddIndex(Index::new(
            "idx_email",
            &["email"],
            Default::default(),
        )));
        alter.specs.push(AlterSpec::DropColumn("legacy".to_string()));
        let statement = Statement::AlterTable(alter);

        assert_eq!(
            statement.to_sql(),
            "ALTER TABLE `shop`.`users` ADD KEY `idx_email` (`email`), DROP COLUMN `legacy`, ALGORITHM = INSTANT"
        );
        assert_eq!(
            statement.to_canonical_sql(),
            "ALTER TABLE `shop`.`users` DROP COLUMN `legacy`, ADD KEY `idx_email` (`email`), ALGORITHM = INSTANT"
        );
    }

    #[test]
    fn canonical_view_collapses_whitespace() {
        let view = View::new("v", "select  id\n  from users");
        let statement = Statement::CreateView {
            name: TableName::resolve("v", None, &DiffHints::default()),
            view,
        };
        assert_eq!(statement.to_sql(), "CREATE VIEW `v` AS select  id\n  from users");
        assert_eq!(statement.to_canonical_sql(), "CREATE VIEW `v` AS select id from users");
    }
}
