//! Table comparison
//!
//! Compares two table definitions and produces the `ALTER TABLE` (or rename,
//! or drop + create) statements that turn one into the other, resolving every
//! ambiguity through the diff hints.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::hints::{
    AutoIncrementStrategy, ColumnRenameStrategy, ConstraintNamesStrategy, DiffHints,
    EnumReorderStrategy, FullTextKeyStrategy, IndexOrderingStrategy, RangeRotationStrategy,
    TableCharsetCollateStrategy, TableRenameStrategy,
};
use crate::schema::entity::Entity;
use crate::schema::entity_diff::EntityDiff;
use crate::schema::statement::{
    normalize_whitespace, AlterSpec, AlterTable, ColumnPosition, PartitionSpec, Statement,
    TableName, TableOptionChange,
};
use crate::schema::types::{
    CheckConstraint, Column, ColumnType, ForeignKey, Index, IndexKind, Partitioning,
    RangePartition, Table, TableOptions,
};

/// Server-generated constraint names, e.g. `orders_ibfk_1` or `orders_chk_2`
static GENERATED_CONSTRAINT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<table>.+)_(?P<kind>ibfk|chk)_[0-9]+$").expect("valid regex")
});

/// Old (lowercase) column name to new column name
type RenameMap = HashMap<String, String>;

/// Diff two tables. Tables with different names are renamed or replaced.
pub(crate) fn diff_tables(from: &Table, to: &Table, hints: &DiffHints) -> Result<EntityDiff> {
    let diff = if from.name == to.name {
        diff_same_name(from, to, hints)?
    } else {
        diff_renamed(from, to, hints)?
    };
    diff.enforce_subsequent_strategy()
}

/// Whether two tables have the same column names and types, in order
pub(crate) fn same_shape(a: &Table, b: &Table) -> bool {
    a.columns.len() == b.columns.len()
        && a.columns
            .iter()
            .zip(&b.columns)
            .all(|(x, y)| x.name.eq_ignore_ascii_case(&y.name) && x.data_type == y.data_type)
}

fn diff_renamed(from: &Table, to: &Table, hints: &DiffHints) -> Result<EntityDiff> {
    let from_entity = Entity::Table(from.clone());
    let to_entity = Entity::Table(to.clone());

    match hints.table_rename {
        TableRenameStrategy::HeuristicStatement if same_shape(from, to) => {
            let mut renamed = from.clone();
            renamed.name = to.name.clone();
            renamed.qualifier = to.qualifier.clone();

            let statement = Statement::RenameTable {
                from: TableName::resolve(&from.name, from.qualifier.as_deref(), hints),
                to: TableName::resolve(&to.name, to.qualifier.as_deref(), hints),
            };
            let mut diff = EntityDiff::changed(
                from_entity,
                Entity::Table(renamed.clone()),
                Some(statement),
                hints,
            );

            // The rest of the diff is computed against the renamed table
            let alter = diff_same_name(&renamed, to, hints)?;
            if !alter.is_empty() {
                diff.append_diff(alter);
            }

            tracing::debug!(from = %from.name, to = %to.name, "Inferred table rename");
            Ok(diff)
        }
        TableRenameStrategy::HeuristicStatement | TableRenameStrategy::AssumeDifferent => {
            let mut diff = from_entity.drop_with_hints(hints);
            diff.append_diff(to_entity.create_with_hints(hints));
            Ok(diff)
        }
    }
}

fn diff_same_name(from: &Table, to: &Table, hints: &DiffHints) -> Result<EntityDiff> {
    let name = TableName::resolve(&to.name, to.qualifier.as_deref(), hints);
    let mut specs = Vec::new();

    let renames = diff_columns(from, to, hints, &mut specs)?;
    diff_primary_key(from, to, &renames, &mut specs);
    diff_indexes(from, to, &renames, hints, &mut specs);
    diff_foreign_keys(from, to, &renames, hints, &mut specs);
    diff_checks(from, to, hints, &mut specs);
    diff_options(&from.options, &to.options, hints, &mut specs);
    let (partition, distinct_partitions) = diff_partitioning(from, to, hints);

    specs.sort_by_key(AlterSpec::precedence);

    let extra_full_text = match hints.full_text_key {
        FullTextKeyStrategy::UnifyStatements => Vec::new(),
        FullTextKeyStrategy::DistinctStatements => split_full_text_keys(&mut specs),
    };

    let mut statements = Vec::new();
    let mut main = AlterTable::new(name.clone(), hints.alter_table_algorithm);
    main.specs = specs;
    main.partition = partition;
    if !main.is_empty() {
        statements.push(main);
    }
    for index in extra_full_text {
        let mut alter = AlterTable::new(name.clone(), hints.alter_table_algorithm);
        alter.specs.push(AlterSpec::AddIndex(index));
        statements.push(alter);
    }
    for spec in distinct_partitions {
        let mut alter = AlterTable::new(name.clone(), hints.alter_table_algorithm);
        alter.partition = Some(spec);
        statements.push(alter);
    }

    let from_entity = Entity::Table(from.clone());
    let to_entity = Entity::Table(to.clone());
    let mut statements = statements.into_iter().map(Statement::AlterTable);

    let mut diff = EntityDiff::changed(
        from_entity.clone(),
        to_entity.clone(),
        statements.next(),
        hints,
    );
    for statement in statements {
        diff.append_diff(EntityDiff::changed(
            from_entity.clone(),
            to_entity.clone(),
            Some(statement),
            hints,
        ));
    }
    Ok(diff)
}

fn find_column<'a>(columns: &'a [Column], name: &str) -> Option<&'a Column> {
    columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

fn preceding(columns: &[Column], index: usize) -> Option<&str> {
    index
        .checked_sub(1)
        .and_then(|i| columns.get(i))
        .map(|c| c.name.as_str())
}

fn same_optional_name(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Drop a column's charset/collation when it merely repeats the table's
fn normalize_column(column: &Column, options: &TableOptions, hints: &DiffHints) -> Column {
    let mut column = column.clone();
    match hints.table_charset_collate {
        TableCharsetCollateStrategy::Strict => {}
        TableCharsetCollateStrategy::IgnoreEmpty | TableCharsetCollateStrategy::IgnoreAlways => {
            if same_optional_name(column.charset.as_deref(), options.charset.as_deref()) {
                column.charset = None;
            }
            if same_optional_name(column.collate.as_deref(), options.collate.as_deref()) {
                column.collate = None;
            }
        }
    }
    column
}

/// Whether any enum/set value common to both types moved to another ordinal
fn enum_ordinals_changed(from: &ColumnType, to: &ColumnType) -> bool {
    if !from.is_enum_or_set() || from.name != to.name {
        return false;
    }
    from.values.iter().enumerate().any(|(i, value)| {
        to.values
            .iter()
            .position(|v| v == value)
            .map_or(false, |j| j != i)
    })
}

fn diff_columns(
    from: &Table,
    to: &Table,
    hints: &DiffHints,
    specs: &mut Vec<AlterSpec>,
) -> Result<RenameMap> {
    let from_columns: Vec<Column> = from
        .columns
        .iter()
        .map(|c| normalize_column(c, &from.options, hints))
        .collect();
    let to_columns: Vec<Column> = to
        .columns
        .iter()
        .map(|c| normalize_column(c, &to.options, hints))
        .collect();

    let dropped: Vec<usize> = (0..from_columns.len())
        .filter(|&i| find_column(&to_columns, &from_columns[i].name).is_none())
        .collect();
    let added: Vec<usize> = (0..to_columns.len())
        .filter(|&j| find_column(&from_columns, &to_columns[j].name).is_none())
        .collect();

    // Rename heuristic: identical definitions at an adjacent position, that is
    // the same ordinal or the same preceding column
    let mut renames: RenameMap = HashMap::new();
    let mut renamed_targets: HashMap<String, String> = HashMap::new();
    if hints.column_rename == ColumnRenameStrategy::HeuristicStatement {
        let mut taken = HashSet::new();
        for &i in &dropped {
            let source = &from_columns[i];
            let candidate = added.iter().copied().find(|&j| {
                !taken.contains(&j)
                    && source.same_definition(&to_columns[j])
                    && (i == j
                        || same_optional_name(
                            preceding(&from_columns, i),
                            preceding(&to_columns, j),
                        ))
            });
            if let Some(j) = candidate {
                taken.insert(j);
                renames.insert(source.name.to_lowercase(), to_columns[j].name.clone());
                renamed_targets.insert(to_columns[j].name.to_lowercase(), source.name.clone());
                tracing::debug!(
                    table = %to.name,
                    from = %source.name,
                    to = %to_columns[j].name,
                    "Inferred column rename"
                );
            }
        }
    }

    for &i in &dropped {
        let name = &from.columns[i].name;
        if !renames.contains_key(&name.to_lowercase()) {
            specs.push(AlterSpec::DropColumn(name.clone()));
        }
    }

    // Replay the column order: after step i the first i + 1 columns match the target
    let mut current: Vec<String> = from
        .columns
        .iter()
        .filter(|c| {
            find_column(&to_columns, &c.name).is_some()
                || renames.contains_key(&c.name.to_lowercase())
        })
        .map(|c| {
            renames
                .get(&c.name.to_lowercase())
                .cloned()
                .unwrap_or_else(|| c.name.clone())
        })
        .collect();

    // Additions and moves are emitted in target order, each relative to the
    // columns placed before it
    for (i, column) in to.columns.iter().enumerate() {
        let position = match i {
            0 => ColumnPosition::First,
            _ => ColumnPosition::After(to.columns[i - 1].name.clone()),
        };
        let key = column.name.to_lowercase();
        let is_new = find_column(&from_columns, &column.name).is_none()
            && !renamed_targets.contains_key(&key);

        if is_new {
            let position = if i == current.len() {
                ColumnPosition::Unchanged
            } else {
                position
            };
            current.insert(i.min(current.len()), column.name.clone());
            specs.push(AlterSpec::AddColumn {
                column: column.clone(),
                position,
            });
            continue;
        }

        let moved = match current
            .iter()
            .position(|name| name.eq_ignore_ascii_case(&column.name))
        {
            Some(index) if index != i => {
                let name = current.remove(index);
                current.insert(i.min(current.len()), name);
                Some(position)
            }
            _ => None,
        };
        let target = &to_columns[i];

        if let Some(old_name) = renamed_targets.get(&key) {
            specs.push(match moved {
                Some(position) => AlterSpec::ChangeColumn {
                    from: old_name.clone(),
                    column: column.clone(),
                    position,
                },
                None => AlterSpec::RenameColumn {
                    from: old_name.clone(),
                    to: column.name.clone(),
                },
            });
            continue;
        }

        let Some(source) = find_column(&from_columns, &column.name) else {
            continue;
        };

        if enum_ordinals_changed(&source.data_type, &target.data_type)
            && hints.enum_reorder == EnumReorderStrategy::Reject
        {
            return Err(Error::EnumValueOrdinalChanged {
                table: to.name.clone(),
                column: column.name.clone(),
            });
        }

        if !source.same_definition(target) || moved.is_some() {
            specs.push(AlterSpec::ModifyColumn {
                column: column.clone(),
                position: moved.unwrap_or(ColumnPosition::Unchanged),
            });
        }
    }

    Ok(renames)
}

/// Lowercase column names, following renames
fn map_columns(columns: &[String], renames: &RenameMap) -> Vec<String> {
    columns
        .iter()
        .map(|name| {
            renames
                .get(&name.to_lowercase())
                .map(|renamed| renamed.to_lowercase())
                .unwrap_or_else(|| name.to_lowercase())
        })
        .collect()
}

fn lowercase(columns: &[String]) -> Vec<String> {
    columns.iter().map(|c| c.to_lowercase()).collect()
}

fn diff_primary_key(from: &Table, to: &Table, renames: &RenameMap, specs: &mut Vec<AlterSpec>) {
    let from_columns = from
        .primary_key
        .as_ref()
        .map(|pk| map_columns(&pk.columns, renames));
    let to_columns = to.primary_key.as_ref().map(|pk| lowercase(&pk.columns));
    if from_columns == to_columns {
        return;
    }
    if from.primary_key.is_some() {
        specs.push(AlterSpec::DropPrimaryKey);
    }
    if let Some(pk) = &to.primary_key {
        specs.push(AlterSpec::AddPrimaryKey(pk.clone()));
    }
}

fn indexes_equal(from: &Index, to: &Index, renames: &RenameMap) -> bool {
    from.kind == to.kind
        && from.comment == to.comment
        && map_columns(&from.columns, renames) == lowercase(&to.columns)
}

fn find_index(indexes: &[Index], name: &str) -> Option<usize> {
    indexes.iter().position(|i| i.name.eq_ignore_ascii_case(name))
}

fn diff_indexes(
    from: &Table,
    to: &Table,
    renames: &RenameMap,
    hints: &DiffHints,
    specs: &mut Vec<AlterSpec>,
) {
    let mut unchanged = HashSet::new();
    let mut readded = HashSet::new();
    for index in &from.indexes {
        let key = index.name.to_lowercase();
        match find_index(&to.indexes, &index.name) {
            None => specs.push(AlterSpec::DropIndex(index.name.clone())),
            Some(j) if indexes_equal(index, &to.indexes[j], renames) => {
                unchanged.insert(key);
            }
            Some(_) => {
                specs.push(AlterSpec::DropIndex(index.name.clone()));
                readded.insert(key);
            }
        }
    }
    for index in &to.indexes {
        if find_index(&from.indexes, &index.name).is_none() {
            readded.insert(index.name.to_lowercase());
        }
    }

    if hints.index_ordering == IndexOrderingStrategy::Strict {
        // Kept indexes stay in place and added ones go to the end
        let mut result: Vec<String> = from
            .indexes
            .iter()
            .map(|i| i.name.to_lowercase())
            .filter(|name| unchanged.contains(name))
            .collect();
        result.extend(
            to.indexes
                .iter()
                .map(|i| i.name.to_lowercase())
                .filter(|name| readded.contains(name)),
        );
        let target: Vec<String> = to.indexes.iter().map(|i| i.name.to_lowercase()).collect();

        // Recreate every unchanged index from the first one out of place
        if let Some(first) = result.iter().zip(&target).position(|(a, b)| a != b) {
            for index in &to.indexes[first..] {
                if unchanged.remove(&index.name.to_lowercase()) {
                    specs.push(AlterSpec::DropIndex(index.name.clone()));
                    readded.insert(index.name.to_lowercase());
                }
            }
        }
    }

    for index in &to.indexes {
        if readded.contains(&index.name.to_lowercase()) {
            specs.push(AlterSpec::AddIndex(index.clone()));
        }
    }
}

/// Keep the first added full-text key, return the others for their own statements
fn split_full_text_keys(specs: &mut Vec<AlterSpec>) -> Vec<Index> {
    let mut seen_first = false;
    let mut extra = Vec::new();
    specs.retain(|spec| match spec {
        AlterSpec::AddIndex(index) if index.kind == IndexKind::FullText => {
            if seen_first {
                extra.push(index.clone());
                false
            } else {
                seen_first = true;
                true
            }
        }
        _ => true,
    });
    extra
}

fn is_generated_name(name: &str, table: &str, kind: &str) -> bool {
    GENERATED_CONSTRAINT_NAME
        .captures(name)
        .map_or(false, |caps| {
            caps["table"].eq_ignore_ascii_case(table) && &caps["kind"] == kind
        })
}

fn constraint_names_match(
    from_name: &str,
    to_name: &str,
    from_table: &str,
    to_table: &str,
    kind: &str,
    hints: &DiffHints,
) -> bool {
    match hints.constraint_names {
        ConstraintNamesStrategy::Strict => from_name.eq_ignore_ascii_case(to_name),
        ConstraintNamesStrategy::IgnoreAll => true,
        ConstraintNamesStrategy::IgnoreGenerated => {
            is_generated_name(from_name, from_table, kind)
                || is_generated_name(to_name, to_table, kind)
                || from_name.eq_ignore_ascii_case(to_name)
        }
    }
}

/// `RESTRICT` and `NO ACTION` are the same thing, and the default
fn referential_action(action: &Option<String>) -> String {
    match action.as_deref().map(|a| normalize_whitespace(a).to_uppercase()) {
        None => "NO ACTION".to_string(),
        Some(action) if action == "RESTRICT" => "NO ACTION".to_string(),
        Some(action) => action,
    }
}

fn foreign_keys_equal(
    from_fk: &ForeignKey,
    to_fk: &ForeignKey,
    from: &Table,
    to: &Table,
    renames: &RenameMap,
    hints: &DiffHints,
) -> bool {
    map_columns(&from_fk.columns, renames) == lowercase(&to_fk.columns)
        && from_fk.ref_table == to_fk.ref_table
        && lowercase(&from_fk.ref_columns) == lowercase(&to_fk.ref_columns)
        && referential_action(&from_fk.on_delete) == referential_action(&to_fk.on_delete)
        && referential_action(&from_fk.on_update) == referential_action(&to_fk.on_update)
        && constraint_names_match(&from_fk.name, &to_fk.name, &from.name, &to.name, "ibfk", hints)
}

fn diff_foreign_keys(
    from: &Table,
    to: &Table,
    renames: &RenameMap,
    hints: &DiffHints,
    specs: &mut Vec<AlterSpec>,
) {
    let mut matched = vec![false; from.foreign_keys.len()];
    for to_fk in &to.foreign_keys {
        let found = (0..from.foreign_keys.len()).find(|&i| {
            !matched[i]
                && foreign_keys_equal(&from.foreign_keys[i], to_fk, from, to, renames, hints)
        });
        match found {
            Some(i) => matched[i] = true,
            None => specs.push(AlterSpec::AddForeignKey(to_fk.clone())),
        }
    }
    for (fk, matched) in from.foreign_keys.iter().zip(matched) {
        if !matched {
            specs.push(AlterSpec::DropForeignKey(fk.name.clone()));
        }
    }
}

fn checks_equal(
    from_check: &CheckConstraint,
    to_check: &CheckConstraint,
    from: &Table,
    to: &Table,
    hints: &DiffHints,
) -> bool {
    normalize_whitespace(&from_check.expression) == normalize_whitespace(&to_check.expression)
        && from_check.enforced == to_check.enforced
        && constraint_names_match(&from_check.name, &to_check.name, &from.name, &to.name, "chk", hints)
}

fn diff_checks(from: &Table, to: &Table, hints: &DiffHints, specs: &mut Vec<AlterSpec>) {
    let mut matched = vec![false; from.checks.len()];
    for to_check in &to.checks {
        let found = (0..from.checks.len())
            .find(|&i| !matched[i] && checks_equal(&from.checks[i], to_check, from, to, hints));
        match found {
            Some(i) => matched[i] = true,
            None => specs.push(AlterSpec::AddCheck(to_check.clone())),
        }
    }
    for (check, matched) in from.checks.iter().zip(matched) {
        if !matched {
            specs.push(AlterSpec::DropCheck(check.name.clone()));
        }
    }
}

fn charset_collate_changed(
    from: Option<&str>,
    to: Option<&str>,
    strategy: TableCharsetCollateStrategy,
) -> Option<String> {
    let to = to?;
    match strategy {
        TableCharsetCollateStrategy::IgnoreAlways => None,
        TableCharsetCollateStrategy::IgnoreEmpty if from.is_none() => None,
        TableCharsetCollateStrategy::Strict | TableCharsetCollateStrategy::IgnoreEmpty => {
            (!same_optional_name(from, Some(to))).then(|| to.to_string())
        }
    }
}

fn diff_options(
    from: &TableOptions,
    to: &TableOptions,
    hints: &DiffHints,
    specs: &mut Vec<AlterSpec>,
) {
    if let Some(engine) = &to.engine {
        if !same_optional_name(from.engine.as_deref(), Some(engine)) {
            specs.push(AlterSpec::TableOption(TableOptionChange::Engine(engine.clone())));
        }
    }

    let strategy = hints.table_charset_collate;
    if let Some(charset) =
        charset_collate_changed(from.charset.as_deref(), to.charset.as_deref(), strategy)
    {
        specs.push(AlterSpec::TableOption(TableOptionChange::Charset(charset)));
    }
    if let Some(collate) =
        charset_collate_changed(from.collate.as_deref(), to.collate.as_deref(), strategy)
    {
        specs.push(AlterSpec::TableOption(TableOptionChange::Collate(collate)));
    }

    if let Some(value) = to.auto_increment {
        let apply = match hints.auto_increment {
            AutoIncrementStrategy::Ignore => false,
            AutoIncrementStrategy::ApplyHigher => from.auto_increment.map_or(true, |v| value > v),
            AutoIncrementStrategy::ApplyAlways => from.auto_increment != Some(value),
        };
        if apply {
            specs.push(AlterSpec::TableOption(TableOptionChange::AutoIncrement(value)));
        }
    }

    if from.comment != to.comment {
        let comment = to.comment.clone().unwrap_or_default();
        specs.push(AlterSpec::TableOption(TableOptionChange::Comment(comment)));
    }
}

fn partitions_equal(a: &RangePartition, b: &RangePartition) -> bool {
    a.name.eq_ignore_ascii_case(&b.name)
        && normalize_whitespace(&a.less_than).eq_ignore_ascii_case(&normalize_whitespace(&b.less_than))
}

fn expressions_equal(a: &Partitioning, b: &Partitioning) -> bool {
    normalize_whitespace(&a.expression).eq_ignore_ascii_case(&normalize_whitespace(&b.expression))
}

/// Partitions dropped from the front and added at the back, if `to` is a
/// rotation of `from`
fn detect_rotation(
    from: &Partitioning,
    to: &Partitioning,
) -> Option<(Vec<String>, Vec<RangePartition>)> {
    if !expressions_equal(from, to) {
        return None;
    }
    let first = to.partitions.first()?;
    let start = from
        .partitions
        .iter()
        .position(|p| p.name.eq_ignore_ascii_case(&first.name))?;
    let kept = &from.partitions[start..];
    if kept.len() > to.partitions.len()
        || !kept.iter().zip(&to.partitions).all(|(a, b)| partitions_equal(a, b))
    {
        return None;
    }

    let dropped: Vec<String> = from.partitions[..start]
        .iter()
        .map(|p| p.name.clone())
        .collect();
    let added = to.partitions[kept.len()..].to_vec();
    if dropped.is_empty() && added.is_empty() {
        None
    } else {
        Some((dropped, added))
    }
}

fn diff_partitioning(
    from: &Table,
    to: &Table,
    hints: &DiffHints,
) -> (Option<PartitionSpec>, Vec<PartitionSpec>) {
    match (&from.partitioning, &to.partitioning) {
        (None, None) => (None, Vec::new()),
        (Some(_), None) => (Some(PartitionSpec::Remove), Vec::new()),
        (None, Some(partitioning)) => (Some(PartitionSpec::Full(partitioning.clone())), Vec::new()),
        (Some(a), Some(b))
            if expressions_equal(a, b)
                && a.partitions.len() == b.partitions.len()
                && a.partitions.iter().zip(&b.partitions).all(|(x, y)| partitions_equal(x, y)) =>
        {
            (None, Vec::new())
        }
        (Some(a), Some(b)) => match detect_rotation(a, b) {
            None => (Some(PartitionSpec::Full(b.clone())), Vec::new()),
            Some((dropped, added)) => match hints.range_rotation {
                RangeRotationStrategy::Ignore => (None, Vec::new()),
                RangeRotationStrategy::FullSpec => (Some(PartitionSpec::Full(b.clone())), Vec::new()),
                RangeRotationStrategy::DistinctStatements => {
                    let specs = dropped
                        .into_iter()
                        .map(|name| PartitionSpec::Drop(vec![name]))
                        .chain(added.into_iter().map(PartitionSpec::Add))
                        .collect();
                    (None, specs)
                }
            },
        },
    }
}
