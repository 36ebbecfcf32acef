//! Integration test: binding tables.
//!
//! A join between bound tables is rewritten shard by shard, so every actual
//! table of the driving table must map to exactly one co-located actual
//! table of each bound table.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shardline_integration_tests::{data_sources, order_rule, order_rule_config};
use shardline_rule::{RuleError, ShardingRule};

#[test]
fn test_binding_group_membership() {
    let rule = order_rule();
    assert!(rule.is_all_binding_tables(&["t_order", "T_ORDER_ITEM"]));
    assert!(rule.is_all_binding_tables(&["t_order_item"]));
    assert!(!rule.is_all_binding_tables(&["t_order", "t_log"]));
    assert!(!rule.is_all_binding_tables(&["t_log"]));
    assert!(!rule.is_all_binding_tables(&[]));

    let group = rule.find_binding_table_rule("t_order_item").unwrap();
    assert_eq!(group.all_logic_tables(), vec!["t_order", "t_order_item"]);
    assert!(rule.find_binding_table_rule("t_dict").is_none());
}

/// Every node of the driving table maps to the node at the same index of
/// the bound table, on the same data source.
#[test]
fn test_every_shard_maps_to_colocated_shard() {
    let rule = order_rule();
    let orders = rule.get_table_rule("t_order").unwrap();
    let items = rule.get_table_rule("t_order_item").unwrap();

    for (index, node) in orders.actual_data_nodes().iter().enumerate() {
        let rewritten = rule
            .get_logic_and_actual_tables_from_binding_table(
                node.data_source_name(),
                "t_order",
                node.table_name(),
                &["t_order", "t_order_item"],
            )
            .unwrap();
        let expected = &items.actual_data_nodes()[index];
        assert_eq!(expected.data_source_name(), node.data_source_name());
        assert_eq!(
            rewritten,
            vec![("t_order_item".to_string(), expected.table_name().to_string())]
        );
    }
}

/// Random lookups against a randomly sized lockstep pair agree on suffix.
#[test]
fn test_random_colocation_lookups() {
    let mut rng = StdRng::seed_from_u64(0xB1D);
    for _ in 0..50 {
        let sources = rng.random_range(1..=4usize);
        let tables = rng.random_range(1..=8usize);
        let mut config = order_rule_config();
        for table in &mut config.tables {
            let logic = table.logic_table.clone();
            table.actual_data_nodes = Some(format!(
                "ds_${{0..{}}}.{logic}_${{0..{}}}",
                sources - 1,
                tables - 1
            ));
        }
        let rule = ShardingRule::new(&config, &data_sources(4)).unwrap();

        let ds = format!("ds_{}", rng.random_range(0..sources));
        let suffix = rng.random_range(0..tables);
        let item = rule
            .find_binding_table_rule("t_order")
            .unwrap()
            .binding_actual_table(&ds, "t_order_item", "t_order", &format!("t_order_{suffix}"))
            .unwrap();
        assert_eq!(item, format!("t_order_item_{suffix}"));
    }
}

#[test]
fn test_lookup_outside_the_group() {
    let rule = order_rule();
    // No binding group: nothing to rewrite.
    assert!(
        rule.get_logic_and_actual_tables_from_binding_table("ds_0", "t_log", "t_log_0", &["t_order"])
            .unwrap()
            .is_empty()
    );
    // Unknown actual table of the driving table.
    assert!(matches!(
        rule.get_logic_and_actual_tables_from_binding_table(
            "ds_0",
            "t_order",
            "t_order_9",
            &["t_order_item"]
        ),
        Err(RuleError::ActualTableNotFound { .. })
    ));
}

/// A broadcast table may join a binding group without being in lockstep,
/// and every shard of the driving table joins it under its logical name.
#[test]
fn test_broadcast_member_in_binding_group() {
    let mut config = order_rule_config();
    config.binding_table_groups = vec!["t_order, t_order_item, t_dict".into()];
    let rule = ShardingRule::new(&config, &data_sources(4)).unwrap();

    assert!(rule.is_all_binding_tables(&["t_order", "t_dict"]));
    assert_eq!(
        rule.find_binding_table_rule("t_dict")
            .unwrap()
            .all_logic_tables(),
        vec!["t_order", "t_order_item", "t_dict"]
    );

    let orders = rule.get_table_rule("t_order").unwrap();
    let items = rule.get_table_rule("t_order_item").unwrap();
    for (index, node) in orders.actual_data_nodes().iter().enumerate() {
        let rewritten = rule
            .get_logic_and_actual_tables_from_binding_table(
                node.data_source_name(),
                "t_order",
                node.table_name(),
                &["t_order_item", "t_dict"],
            )
            .unwrap();
        assert_eq!(
            rewritten,
            vec![
                (
                    "t_order_item".to_string(),
                    items.actual_data_nodes()[index].table_name().to_string()
                ),
                ("t_dict".to_string(), "t_dict".to_string()),
            ],
            "driving node {node}"
        );
    }

    // Driven from the broadcast side, each source maps to its first local shard.
    let rewritten = rule
        .get_logic_and_actual_tables_from_binding_table("ds_2", "t_dict", "t_dict", &["t_order"])
        .unwrap();
    assert_eq!(rewritten, vec![("t_order".to_string(), "t_order_0".to_string())]);
}
