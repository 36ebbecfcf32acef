//! Integration test: configuration to rule.
//!
//! Builds the order schema from typed and TOML configuration, checks the
//! resulting topology, and walks the ways a deployment can be misconfigured.

use std::sync::Arc;
use std::thread;

use shardline_algorithm::GeneratedKey;
use shardline_integration_tests::{data_sources, order_rule, order_rule_config};
use shardline_placement::PlacementError;
use shardline_rule::{RuleError, RuleHolder, ShardingRule};
use shardline_types::*;

/// Four data sources, four tables each, plus an eight-way auto table.
#[test]
fn test_order_topology() {
    let rule = order_rule();
    assert_eq!(rule.data_source_names(), data_sources(4).as_slice());
    assert_eq!(rule.get_tables(), vec!["t_order", "t_order_item", "t_log"]);

    let order = rule.get_table_rule("T_ORDER").unwrap();
    assert_eq!(order.actual_data_nodes().len(), 16);
    for ds in data_sources(4) {
        assert_eq!(order.actual_table_names(&ds).len(), 4);
    }

    let log = rule.get_table_rule("t_log").unwrap();
    let placement: Vec<String> = log
        .actual_data_nodes()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        placement,
        vec![
            "ds_0.t_log_0",
            "ds_1.t_log_1",
            "ds_2.t_log_2",
            "ds_3.t_log_3",
            "ds_0.t_log_4",
            "ds_1.t_log_5",
            "ds_2.t_log_6",
            "ds_3.t_log_7",
        ]
    );

    // Broadcast tables live on every data source without a table rule.
    let dict = rule.get_table_rule("t_dict").unwrap();
    assert_eq!(dict.actual_data_nodes().len(), 4);
    assert!(rule.find_table_rule("t_dict").is_none());
}

/// Strategy resolution falls back to the rule defaults, except for auto
/// tables which never shard by database.
#[test]
fn test_sharding_columns_resolve_through_defaults() {
    let rule = order_rule();
    assert!(rule.is_sharding_column("user_id", "t_order"));
    assert!(rule.is_sharding_column("ORDER_ID", "t_order_item"));
    assert!(!rule.is_sharding_column("status", "t_order"));

    assert!(rule.is_sharding_column("log_id", "t_log"));
    assert!(!rule.is_sharding_column("user_id", "t_log"));
}

/// Generated keys come from the configured snowflake worker.
#[test]
fn test_generated_keys_carry_worker_id() {
    let rule = order_rule();
    assert_eq!(rule.find_generate_key_column_name("t_order"), Some("order_id"));
    assert!(rule.is_generate_key_column("order_id", "t_log"));

    let mut last = 0;
    for _ in 0..100 {
        let GeneratedKey::Long(key) = rule.generate_key("t_order").unwrap() else {
            panic!("snowflake keys are numeric");
        };
        assert_eq!((key >> 12) & 0x3ff, 7);
        assert!(key > last);
        last = key;
    }
}

/// Reverse lookup from physical names back to logical tables.
#[test]
fn test_reverse_lookup() {
    let rule = order_rule();
    assert_eq!(
        rule.find_logic_table_by_actual_table("T_ORDER_ITEM_3"),
        Some("t_order_item")
    );
    assert_eq!(rule.find_logic_table_by_actual_table("t_log_6"), Some("t_log"));
    assert_eq!(rule.find_logic_table_by_actual_table("t_user_0"), None);

    let all = rule.get_all_actual_tables();
    assert_eq!(all.len(), 4 + 4 + 8);
    assert!(all.contains("t_order_item_0"));
}

/// Locating a table on a data source.
#[test]
fn test_data_node_lookup() {
    let rule = order_rule();
    assert_eq!(
        rule.get_data_node_in("ds_1", "t_order").unwrap(),
        &DataNode::new("ds_1", "t_order_0")
    );
    assert_eq!(
        rule.get_data_node_in("ds_3", "t_log").unwrap(),
        &DataNode::new("ds_3", "t_log_3")
    );
    assert!(matches!(
        rule.get_data_node_in("ds_9", "t_order"),
        Err(RuleError::NoDataNode { .. })
    ));
    assert_eq!(
        rule.get_data_node("t_dict").unwrap(),
        &DataNode::new("ds_0", "t_dict")
    );
}

/// The same configuration written as TOML builds the same rule.
#[test]
fn test_rule_from_toml_matches_typed_config() {
    let text = toml::to_string(&order_rule_config()).unwrap();
    let parsed: ShardingRuleConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, order_rule_config());

    let rule = ShardingRule::new(&parsed, &data_sources(4)).unwrap();
    assert_eq!(rule.get_all_data_nodes(), order_rule().get_all_data_nodes());
}

/// A deployment sharding over a subset of its data sources.
#[test]
fn test_rule_uses_declared_subset_of_data_sources() {
    let mut config = order_rule_config();
    for table in &mut config.tables {
        let logic = table.logic_table.clone();
        table.actual_data_nodes = Some(format!("ds_${{0..1}}.{logic}_${{0..3}}"));
    }
    let rule = ShardingRule::new(&config, &data_sources(4)).unwrap();
    assert_eq!(rule.data_source_names(), data_sources(2).as_slice());
    // Auto and broadcast tables follow the effective set.
    assert_eq!(rule.get_table_rule("t_log").unwrap().actual_data_source_names().len(), 2);
    assert_eq!(rule.get_table_rule("t_dict").unwrap().actual_data_nodes().len(), 2);
}

/// Every misconfiguration fails construction with a precise error.
#[test]
fn test_misconfigurations_fail_fast() {
    let build = |config: &ShardingRuleConfig| ShardingRule::new(config, &data_sources(4));

    let mut config = order_rule_config();
    config.tables[0].actual_data_nodes = Some("ds_${0..4}.t_order_${0..3}".into());
    assert!(matches!(
        build(&config),
        Err(RuleError::Placement(PlacementError::UnknownDataSource { .. }))
    ));

    let mut config = order_rule_config();
    config.tables[1].actual_data_nodes = Some("ds_${0..3}.t_order_item_${0..1}".into());
    assert!(matches!(
        build(&config),
        Err(RuleError::InconsistentBindingTables { .. })
    ));

    let mut config = order_rule_config();
    config.auto_tables[0].sharding_strategy =
        Some(ShardingStrategyConfig::standard("log_id", "order_inline"));
    assert!(matches!(
        build(&config),
        Err(RuleError::NotAutoTableAlgorithm { .. })
    ));

    let mut config = order_rule_config();
    config.tables[0].key_generate_strategy = Some(KeyGenerateStrategyConfig {
        column: "order_id".into(),
        key_generator_name: Some("missing".into()),
    });
    assert!(matches!(
        build(&config),
        Err(RuleError::UnknownKeyGenerator { .. })
    ));

    let mut config = order_rule_config();
    config.tables[0].table_strategy = Some(ShardingStrategyConfig::standard("order_id", "nope"));
    assert!(matches!(
        build(&config),
        Err(RuleError::UnknownShardingAlgorithm { .. })
    ));

    let mut config = order_rule_config();
    config.binding_table_groups = vec!["t_order, t_user".into()];
    assert!(matches!(
        build(&config),
        Err(RuleError::UnknownBindingTable { .. })
    ));
}

/// Readers keep a whole snapshot while the rule is replaced under them.
#[test]
fn test_reconfiguration_swaps_whole_rule() {
    let holder = RuleHolder::new(order_rule());
    let before = holder.current();

    let mut config = order_rule_config();
    for table in &mut config.tables {
        let logic = table.logic_table.clone();
        table.actual_data_nodes = Some(format!("ds_${{0..3}}.{logic}_${{0..7}}"));
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let holder = Arc::clone(&holder);
            thread::spawn(move || {
                for _ in 0..500 {
                    let rule = holder.current();
                    let orders = rule.get_table_rule("t_order").unwrap().actual_data_nodes().len();
                    let items = rule
                        .get_table_rule("t_order_item")
                        .unwrap()
                        .actual_data_nodes()
                        .len();
                    assert_eq!(orders, items);
                    assert!(orders == 16 || orders == 32);
                }
            })
        })
        .collect();
    let previous = holder.replace(ShardingRule::new(&config, &data_sources(4)).unwrap());
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(Arc::ptr_eq(&previous, &before));
    assert_eq!(before.get_table_rule("t_order").unwrap().actual_data_nodes().len(), 16);
    assert_eq!(
        holder.current().get_table_rule("t_order").unwrap().actual_data_nodes().len(),
        32
    );
    assert_eq!(holder.version(), 1);
}
