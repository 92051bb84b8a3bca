//! Diff hints
//!
//! A diff between two schema objects is frequently ambiguous: a dropped and an
//! added column may be a rename, a rotated partition range may be expressed in
//! several ways, a generated constraint name may or may not matter. `DiffHints`
//! resolves each of these ambiguities deterministically. Every strategy defaults
//! to its most conservative variant.

use serde::{Deserialize, Serialize};

/// Whether the declaration order of indexes within a table is significant.
/// The column order inside a single index is always significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOrderingStrategy {
    #[default]
    Lenient,
    Strict,
}

/// How a changed `AUTO_INCREMENT` table option is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoIncrementStrategy {
    #[default]
    Ignore,
    ApplyHigher,
    ApplyAlways,
}

/// How rotated range partitions are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeRotationStrategy {
    #[default]
    FullSpec,
    DistinctStatements,
    Ignore,
}

/// Whether constraint names count toward constraint equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintNamesStrategy {
    /// Names matching the server's generated pattern are ignored
    #[default]
    IgnoreGenerated,
    IgnoreAll,
    Strict,
}

/// Whether a dropped + added column pair may be inferred as a rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRenameStrategy {
    #[default]
    AssumeDifferent,
    HeuristicStatement,
}

/// Whether two differently named tables may be inferred as a rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRenameStrategy {
    #[default]
    AssumeDifferent,
    HeuristicStatement,
}

/// Whether several added full-text keys share one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullTextKeyStrategy {
    #[default]
    DistinctStatements,
    UnifyStatements,
}

/// Sensitivity to inherited vs. explicit table charset and collation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableCharsetCollateStrategy {
    #[default]
    Strict,
    IgnoreEmpty,
    IgnoreAlways,
}

/// Whether table names are rendered with their declared qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableQualifierHint {
    #[default]
    Default,
    Declared,
}

/// Which `ALGORITHM=` clause, if any, is forced on `ALTER TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlterTableAlgorithmStrategy {
    #[default]
    None,
    Instant,
    Inplace,
    Copy,
}

impl AlterTableAlgorithmStrategy {
    /// The keyword rendered in the `ALGORITHM` clause
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            AlterTableAlgorithmStrategy::None => None,
            AlterTableAlgorithmStrategy::Instant => Some("INSTANT"),
            AlterTableAlgorithmStrategy::Inplace => Some("INPLACE"),
            AlterTableAlgorithmStrategy::Copy => Some("COPY"),
        }
    }
}

/// Whether a change of enum/set value ordinals is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumReorderStrategy {
    #[default]
    Allow,
    Reject,
}

/// Whether foreign key references are validated while diffing schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyCheckStrategy {
    #[default]
    Strict,
    Ignore,
}

/// Whether a diff may be realized as a chain of several statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsequentDiffStrategy {
    #[default]
    Allow,
    Reject,
}

/// An assortment of rules for diffing entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffHints {
    pub index_ordering: IndexOrderingStrategy,
    pub auto_increment: AutoIncrementStrategy,
    pub range_rotation: RangeRotationStrategy,
    pub constraint_names: ConstraintNamesStrategy,
    pub column_rename: ColumnRenameStrategy,
    pub table_rename: TableRenameStrategy,
    pub full_text_key: FullTextKeyStrategy,
    pub table_charset_collate: TableCharsetCollateStrategy,
    pub table_qualifier: TableQualifierHint,
    pub alter_table_algorithm: AlterTableAlgorithmStrategy,
    pub enum_reorder: EnumReorderStrategy,
    pub foreign_key_check: ForeignKeyCheckStrategy,
    pub subsequent_diff: SubsequentDiffStrategy,
}

impl DiffHints {
    /// Hints with every strategy at its default
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_index_ordering(mut self, strategy: IndexOrderingStrategy) -> Self {
        self.index_ordering = strategy;
        self
    }

    pub fn with_auto_increment(mut self, strategy: AutoIncrementStrategy) -> Self {
        self.auto_increment = strategy;
        self
    }

    pub fn with_range_rotation(mut self, strategy: RangeRotationStrategy) -> Self {
        self.range_rotation = strategy;
        self
    }

    pub fn with_constraint_names(mut self, strategy: ConstraintNamesStrategy) -> Self {
        self.constraint_names = strategy;
        self
    }

    pub fn with_column_rename(mut self, strategy: ColumnRenameStrategy) -> Self {
        self.column_rename = strategy;
        self
    }

    pub fn with_table_rename(mut self, strategy: TableRenameStrategy) -> Self {
        self.table_rename = strategy;
        self
    }

    pub fn with_full_text_key(mut self, strategy: FullTextKeyStrategy) -> Self {
        self.full_text_key = strategy;
        self
    }

    pub fn with_table_charset_collate(mut self, strategy: TableCharsetCollateStrategy) -> Self {
        self.table_charset_collate = strategy;
        self
    }

    pub fn with_table_qualifier(mut self, hint: TableQualifierHint) -> Self {
        self.table_qualifier = hint;
        self
    }

    pub fn with_alter_table_algorithm(mut self, strategy: AlterTableAlgorithmStrategy) -> Self {
        self.alter_table_algorithm = strategy;
        self
    }

    pub fn with_enum_reorder(mut self, strategy: EnumReorderStrategy) -> Self {
        self.enum_reorder = strategy;
        self
    }

    pub fn with_foreign_key_check(mut self, strategy: ForeignKeyCheckStrategy) -> Self {
        self.foreign_key_check = strategy;
        self
    }

    pub fn with_subsequent_diff(mut self, strategy: SubsequentDiffStrategy) -> Self {
        self.subsequent_diff = strategy;
        self
    }
}
