//! Properties every entity diff must hold, whatever the hints

use pretty_assertions::assert_eq;
use rstest::*;

use schema_diff::hints::*;
use schema_diff::schema::types::{
    CheckConstraint, Column, ForeignKey, ForeignKeyTableColumns, Index, IndexKind, Partitioning,
    PrimaryKey, RangePartition, Table, View,
};
use schema_diff::{AnnotationType, DiffHints, Entity, EntityDiff, Error, InstantDdlCapability};

#[fixture]
fn orders() -> Entity {
    let mut table = Table::new("orders");
    table.add_column(Column::parse("id", "bigint unsigned").unwrap().nullable(false).auto_increment());
    table.add_column(Column::parse("user_id", "int").unwrap().nullable(false));
    table.add_column(Column::parse("status", "enum('new','paid','shipped')").unwrap().default("'new'"));
    table.add_column(Column::parse("note", "text").unwrap());
    table.add_column(Column::parse("summary", "text").unwrap().comment("free text"));
    table.set_primary_key(PrimaryKey::new(&["id"]));
    table.add_index(Index::new("idx_user", &["user_id"], IndexKind::Normal));
    table.add_index(Index::new("idx_status", &["status", "user_id"], IndexKind::Normal));
    table.add_index(Index::new("ft_note", &["note"], IndexKind::FullText));
    table.add_index(Index::new("ft_summary", &["summary"], IndexKind::FullText));
    table.add_foreign_key(ForeignKey::new("orders_ibfk_1", &["user_id"], "users", &["id"]));
    table.add_check(CheckConstraint::new("orders_chk_1", "user_id > 0"));
    table.options.engine = Some("InnoDB".to_string());
    table.options.charset = Some("utf8mb4".to_string());
    table.options.auto_increment = Some(1000);
    table.partitioning = Some(Partitioning {
        expression: "id".to_string(),
        partitions: vec![
            RangePartition::new("p0", "1000000"),
            RangePartition::new("p1", "2000000"),
        ],
    });
    Entity::table(table).unwrap()
}

#[fixture]
fn active_orders() -> Entity {
    let mut view = View::new("active_orders", "SELECT id, user_id FROM orders WHERE status <> 'shipped'");
    view.security = Some("invoker".to_string());
    Entity::view(view).unwrap()
}

fn users(name_type: &str) -> Entity {
    let mut table = Table::new("users");
    table.add_column(Column::parse("id", "int").unwrap().nullable(false));
    table.add_column(Column::parse("name", name_type).unwrap());
    table.set_primary_key(PrimaryKey::new(&["id"]));
    Entity::table(table).unwrap()
}

fn all_hint_variants() -> Vec<DiffHints> {
    let base = DiffHints::default();
    vec![
        base,
        base.with_index_ordering(IndexOrderingStrategy::Strict),
        base.with_auto_increment(AutoIncrementStrategy::ApplyHigher),
        base.with_auto_increment(AutoIncrementStrategy::ApplyAlways),
        base.with_range_rotation(RangeRotationStrategy::DistinctStatements),
        base.with_range_rotation(RangeRotationStrategy::Ignore),
        base.with_constraint_names(ConstraintNamesStrategy::IgnoreAll),
        base.with_constraint_names(ConstraintNamesStrategy::Strict),
        base.with_column_rename(ColumnRenameStrategy::HeuristicStatement),
        base.with_table_rename(TableRenameStrategy::HeuristicStatement),
        base.with_full_text_key(FullTextKeyStrategy::UnifyStatements),
        base.with_table_charset_collate(TableCharsetCollateStrategy::Strict),
        base.with_table_charset_collate(TableCharsetCollateStrategy::IgnoreAlways),
        base.with_table_qualifier(TableQualifierHint::Declared),
        base.with_alter_table_algorithm(AlterTableAlgorithmStrategy::Instant),
        base.with_alter_table_algorithm(AlterTableAlgorithmStrategy::Copy),
        base.with_enum_reorder(EnumReorderStrategy::Reject),
        base.with_foreign_key_check(ForeignKeyCheckStrategy::Ignore),
        base.with_subsequent_diff(SubsequentDiffStrategy::Reject),
    ]
}

#[rstest]
fn test_self_diff_is_empty(orders: Entity, active_orders: Entity) {
    for hints in all_hint_variants() {
        for entity in [&orders, &active_orders] {
            let diff = entity.diff(entity, &hints).unwrap();
            assert!(diff.is_empty(), "{} under {:?}", entity.name(), hints);
            assert!(diff.statement().is_none());
            assert_eq!(diff.statement_string(), "");
            assert_eq!(diff.canonical_statement_string(), "");
            assert_eq!(diff.instant_ddl_capability(), InstantDdlCapability::Irrelevant);
        }
    }
}

#[rstest]
fn test_clone_diff_is_empty(orders: Entity, active_orders: Entity) {
    for entity in [orders, active_orders] {
        let copy = entity.clone();
        assert!(entity.diff(&copy, &DiffHints::default()).unwrap().is_empty());
        assert!(copy.diff(&entity, &DiffHints::default()).unwrap().is_empty());
    }
}

#[rstest]
#[case("varchar(50)", "varchar(100)")]
#[case("int", "bigint")]
#[case("enum('a','b')", "enum('a','b','c')")]
fn test_statement_present_iff_not_empty(#[case] from: &str, #[case] to: &str) {
    let diff = users(from).diff(&users(to), &DiffHints::default()).unwrap();
    assert!(!diff.is_empty());
    assert!(diff.statement().is_some());
    assert!(!diff.statement_string().is_empty());
    assert!(!diff.canonical_statement_string().is_empty());
}

#[test]
fn test_varchar_widening_is_instant() {
    let diff = users("varchar(50)")
        .diff(&users("varchar(100)"), &DiffHints::default())
        .unwrap();

    assert_eq!(
        diff.statement_string(),
        "ALTER TABLE `users` MODIFY COLUMN `name` varchar(100)"
    );
    assert_eq!(diff.entity_name(), "users");
    assert_eq!(diff.instant_ddl_capability(), InstantDdlCapability::Possible);

    let hints = DiffHints::default().with_alter_table_algorithm(AlterTableAlgorithmStrategy::Copy);
    let diff = users("varchar(50)").diff(&users("varchar(100)"), &hints).unwrap();
    assert_eq!(
        diff.statement_string(),
        "ALTER TABLE `users` MODIFY COLUMN `name` varchar(100), ALGORITHM = COPY"
    );
    assert_eq!(diff.instant_ddl_capability(), InstantDdlCapability::Impossible);
}

#[test]
fn test_classification_is_deterministic() {
    let diff = users("varchar(50)")
        .diff(&users("varchar(1000)"), &DiffHints::default())
        .unwrap();
    assert_eq!(diff.evaluated_instant_ddl_capability(), InstantDdlCapability::Unknown);

    let first = diff.instant_ddl_capability();
    assert_eq!(first, InstantDdlCapability::Impossible);
    assert_eq!(diff.instant_ddl_capability(), first);
    assert_eq!(diff.clone().instant_ddl_capability(), first);
    assert_eq!(diff.evaluated_instant_ddl_capability(), first);
}

#[test]
fn test_canonical_statements_ignore_spec_order() {
    let base = users("text");
    let with_indexes = |names: &[&str]| {
        let Entity::Table(mut table) = base.clone() else {
            unreachable!()
        };
        for name in names {
            table.add_index(Index::new(name, &["name"], IndexKind::Normal));
        }
        Entity::table(table).unwrap()
    };

    let hints = DiffHints::default();
    let ab = base.diff(&with_indexes(&["idx_a", "idx_b"]), &hints).unwrap();
    let ba = base.diff(&with_indexes(&["idx_b", "idx_a"]), &hints).unwrap();

    assert_ne!(ab.statement_string(), ba.statement_string());
    assert_eq!(ab.canonical_statement_string(), ba.canonical_statement_string());
    assert_eq!(
        ab.canonical_statement_string(),
        "ALTER TABLE `users` ADD KEY `idx_a` (`name`), ADD KEY `idx_b` (`name`)"
    );
}

#[rstest]
fn test_chain_links_are_owned(orders: Entity, active_orders: Entity) {
    let hints = DiffHints::default();
    let mut head = active_orders.drop_with_hints(&hints);
    head.set_subsequent_diff(Some(orders.drop_with_hints(&hints)));

    let next = head.subsequent_diff().unwrap();
    assert_eq!(next, &orders.drop_with_hints(&hints));
    assert_eq!(next.statement_string(), "DROP TABLE `orders`");

    let copy = head.clone();
    head.append_diff(orders.create_with_hints(&hints));
    head.set_subsequent_diff(None);

    assert_eq!(head.chain_len(), 1);
    assert_eq!(copy.chain_len(), 2);
    assert_eq!(
        copy.statement_strings(),
        vec!["DROP VIEW `active_orders`", "DROP TABLE `orders`"]
    );
}

#[rstest]
fn test_annotations_partition_text(orders: Entity) {
    let Entity::Table(mut table) = orders.clone() else {
        unreachable!()
    };
    table.columns.retain(|c| c.name != "summary");
    table.indexes.retain(|i| i.name != "ft_summary");
    table.add_column(Column::parse("total", "decimal(10,2)").unwrap());
    let target = Entity::table(table).unwrap();

    let diff = orders.diff(&target, &DiffHints::default()).unwrap();
    let (from, to, unified) = diff.annotated();

    assert_eq!(from.text(), orders.create().statement_string());
    assert_eq!(to.text(), target.create().statement_string());
    assert!(!from.by_type(AnnotationType::Removed).is_empty());
    assert!(!to.by_type(AnnotationType::Added).is_empty());
    assert!(unified.export().contains("+  `total` decimal(10,2)"));

    let (again, _, _) = diff.annotated();
    assert_eq!(again, from);
}

#[rstest]
fn test_mismatched_kinds(orders: Entity, active_orders: Entity) {
    let result = orders.diff(&active_orders, &DiffHints::default());
    assert!(matches!(result, Err(Error::MismatchedKind { .. })));
}

#[test]
fn test_foreign_key_reference_escaping() {
    let referenced = ForeignKeyTableColumns::new("orders", vec!["user_id".to_string()]).unwrap();
    assert_eq!(referenced.escaped(), "`orders` (`user_id`)");
    assert!(ForeignKeyTableColumns::new("orders", Vec::new()).is_err());
    assert!(ForeignKeyTableColumns::new("", vec!["id".to_string()]).is_err());
}

#[rstest]
fn test_create_and_drop(orders: Entity, active_orders: Entity) {
    let create = active_orders.create();
    assert_eq!(create.entities(), (None, Some(&active_orders)));
    assert_eq!(
        create.statement_string(),
        "CREATE SQL SECURITY INVOKER VIEW `active_orders` AS SELECT id, user_id FROM orders WHERE status <> 'shipped'"
    );

    let drop = orders.drop();
    assert_eq!(drop.entities(), (Some(&orders), None));
    assert_eq!(drop.statement_string(), "DROP TABLE `orders`");
    assert_eq!(drop.instant_ddl_capability(), InstantDdlCapability::Irrelevant);
}

#[test]
fn test_chained_diff_iterates_in_order() {
    let hints = DiffHints::default();
    let mut head: EntityDiff = users("int").drop_with_hints(&hints);
    head.append_diff(users("text").create_with_hints(&hints));

    let kinds: Vec<String> = head
        .chain()
        .map(|d| d.statement_string().split(' ').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(kinds, vec!["DROP", "CREATE"]);
}
