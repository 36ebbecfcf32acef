//! Chaos test: random schema drift and data source faults.
//!
//! Shards of the order schema are mutated at random; the uniformity check
//! must report exactly the mutated shards, and a fault on any data source
//! must fail the load instead of producing a partial answer.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shardline_integration_tests::{ShardFleet, data_sources, order_rule, props};
use shardline_meta::MetaDataError;
use shardline_types::*;

/// Apply one random, decoration-visible change to `table`.
fn mutate(table: &mut TableMetaData, rng: &mut StdRng) {
    match rng.random_range(0..4) {
        0 => table.columns[1].data_type = "bigint".into(),
        1 => table.columns[0].primary_key = false,
        2 => table.columns.push(ColumnMetaData::new("extra", "int")),
        _ => {
            table.indexes.pop();
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_drift_is_reported_exactly() {
    let rule = order_rule();
    let nodes = rule.get_table_rule("t_order").unwrap().actual_data_nodes().to_vec();

    for seed in 0..40u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let fleet = ShardFleet::new();
        fleet.create_table(&rule, "t_order").await;

        // The first node is the reference; drift only the others.
        let mut drifted = BTreeSet::new();
        for (index, node) in nodes.iter().enumerate().skip(1) {
            if rng.random_bool(0.2) {
                fleet.alter(node, |table| mutate(table, &mut rng)).await;
                drifted.insert(index);
            }
        }

        let result = fleet.loader(props(true)).load(&rule, "t_order").await;
        if drifted.is_empty() {
            assert!(result.unwrap().is_some(), "seed {seed}");
            continue;
        }
        match result {
            Err(MetaDataError::Inconsistent { violations, .. }) => {
                let reported: Vec<&DataNode> = violations.iter().map(|v| &v.data_node).collect();
                let expected: Vec<&DataNode> = drifted.iter().map(|&i| &nodes[i]).collect();
                assert_eq!(reported, expected, "seed {seed}");
            }
            other => panic!("seed {seed}: expected an inconsistency, got {other:?}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_source_fault_fails_load() {
    let rule = order_rule();
    let mut rng = StdRng::seed_from_u64(0xFA17);

    for _ in 0..10 {
        let fleet = ShardFleet::new();
        fleet.create_table(&rule, "t_order").await;
        for ds in data_sources(4) {
            let delay = Duration::from_millis(rng.random_range(0..20));
            fleet.slow_source(&ds, delay).await;
        }
        let victim = format!("ds_{}", rng.random_range(0..4));
        fleet.kill_source(&victim).await;

        let err = fleet
            .loader(props(true))
            .load(&rule, "t_order")
            .await
            .unwrap_err();
        match err {
            MetaDataError::Load { data_node, .. } => {
                assert_eq!(data_node.data_source_name(), victim);
            }
            other => panic!("expected a load error, got {other:?}"),
        }
    }
}

/// Loads for different tables run side by side, each with its own pool.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_are_isolated() {
    let rule = Arc::new(order_rule());
    let fleet = ShardFleet::new();
    for table in ["t_order", "t_order_item", "t_log"] {
        fleet.create_table(&rule, table).await;
    }
    for ds in data_sources(4) {
        fleet.slow_source(&ds, Duration::from_millis(5)).await;
    }

    let mut handles = Vec::new();
    for i in 0..12 {
        let table = ["t_order", "t_order_item", "t_log"][i % 3];
        let rule = Arc::clone(&rule);
        let loader = fleet.loader(props(true));
        handles.push(tokio::spawn(async move {
            loader.load(&rule, table).await.map(|t| t.map(|t| t.name))
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let name = handle.await.unwrap().unwrap().unwrap();
        assert_eq!(name, ["t_order", "t_order_item", "t_log"][i % 3]);
    }
    assert_eq!(fleet.fetch_count(), 4 * (16 + 16 + 8));
}
