//! Shared test harness for shardline integration tests.
//!
//! Provides [`ShardFleet`], an in-memory set of physical data sources that
//! serves table schemas to the metadata loader. Data sources can be taken
//! down, slowed, or given a diverging schema on individual data nodes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use shardline_meta::{SchemaLoadError, SchemaLoader, ShardingMetaDataLoader};
use shardline_rule::ShardingRule;
use shardline_types::*;
use tokio::sync::RwLock;

// =========================================================================
// Shard fleet
// =========================================================================

/// In-memory physical databases keyed by data node.
///
/// Supports failure injection: data sources in `down` answer every fetch
/// with an error, data sources in `latency` answer late.
#[derive(Default)]
pub struct ShardFleet {
    tables: RwLock<HashMap<DataNode, TableMetaData>>,
    down: RwLock<HashSet<String>>,
    latency: RwLock<HashMap<String, Duration>>,
    fetches: AtomicUsize,
}

#[async_trait]
impl SchemaLoader for ShardFleet {
    async fn load(
        &self,
        data_node: &DataNode,
        _database_type: DatabaseType,
    ) -> Result<Option<TableMetaData>, SchemaLoadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let ds = data_node.data_source_name();
        let delay = self.latency.read().await.get(ds).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.down.read().await.contains(ds) {
            return Err(SchemaLoadError::Unavailable(format!("{ds} is down")));
        }
        Ok(self.tables.read().await.get(data_node).cloned())
    }
}

impl ShardFleet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create `logic_table`'s physical tables on every one of its data nodes.
    pub async fn create_table(&self, rule: &ShardingRule, logic_table: &str) {
        let table_rule = rule.get_table_rule(logic_table).unwrap();
        let mut tables = self.tables.write().await;
        for node in table_rule.actual_data_nodes() {
            tables.insert(node.clone(), physical_table(node.table_name()));
        }
    }

    /// Replace the schema stored on one data node.
    pub async fn put(&self, node: DataNode, table: TableMetaData) {
        self.tables.write().await.insert(node, table);
    }

    /// Apply `f` to the schema stored on `node`.
    pub async fn alter(&self, node: &DataNode, f: impl FnOnce(&mut TableMetaData)) {
        let mut tables = self.tables.write().await;
        f(tables.get_mut(node).expect("no table on data node"));
    }

    /// Drop the physical table on `node`.
    pub async fn drop_table(&self, node: &DataNode) {
        self.tables.write().await.remove(node);
    }

    /// Make every fetch against `data_source` fail.
    pub async fn kill_source(&self, data_source: &str) {
        self.down.write().await.insert(data_source.to_string());
    }

    pub async fn revive_source(&self, data_source: &str) {
        self.down.write().await.remove(data_source);
    }

    /// Delay every fetch against `data_source`.
    pub async fn slow_source(&self, data_source: &str, delay: Duration) {
        self.latency
            .write()
            .await
            .insert(data_source.to_string(), delay);
    }

    /// Physical fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// A metadata loader reading from this fleet.
    pub fn loader(self: &Arc<Self>, props: ConfigProps) -> ShardingMetaDataLoader {
        ShardingMetaDataLoader::new(self.clone(), DatabaseType::MySql, props)
    }
}

// =========================================================================
// Fixtures
// =========================================================================

/// `ds_0` .. `ds_{n-1}`.
pub fn data_sources(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("ds_{i}")).collect()
}

/// Loader properties with the uniformity check switched on or off.
pub fn props(check: bool) -> ConfigProps {
    ConfigProps {
        check_table_metadata_enabled: check,
        ..Default::default()
    }
}

/// The physical schema of one order shard, with its index names suffixed
/// by the actual table name the way databases require.
pub fn physical_table(actual_table: &str) -> TableMetaData {
    TableMetaData::new(
        actual_table,
        vec![
            ColumnMetaData::new("order_id", "bigint").primary_key(true),
            ColumnMetaData::new("user_id", "int"),
            ColumnMetaData::new("status", "varchar"),
        ],
        vec![
            IndexMetaData::new(format!("user_idx_{actual_table}")),
            IndexMetaData::new(format!("status_idx_{actual_table}")),
        ],
    )
}

/// An order schema over four data sources.
///
/// - `t_order` and `t_order_item`: `ds_${0..3}.*_${0..3}`, bound together,
///   databases by `user_id % 4`, tables by `order_id % 4`;
/// - `t_log`: auto table with `MOD` over eight tables;
/// - `t_dict`: broadcast;
/// - generated keys on `order_id` from the `snowflake` generator.
pub fn order_rule_config() -> ShardingRuleConfig {
    let mut config = ShardingRuleConfig {
        binding_table_groups: vec!["t_order, t_order_item".into()],
        broadcast_tables: vec!["t_dict".into()],
        default_database_strategy: Some(ShardingStrategyConfig::standard(
            "user_id",
            "database_inline",
        )),
        default_key_generate_strategy: Some(KeyGenerateStrategyConfig {
            column: "order_id".into(),
            key_generator_name: Some("snowflake".into()),
        }),
        ..Default::default()
    };

    for (logic, algorithm, expression) in [
        ("t_order", "order_inline", "t_order_${order_id % 4}"),
        ("t_order_item", "order_item_inline", "t_order_item_${order_id % 4}"),
    ] {
        let mut table = TableRuleConfig::new(logic, format!("ds_${{0..3}}.{logic}_${{0..3}}"));
        table.table_strategy = Some(ShardingStrategyConfig::standard("order_id", algorithm));
        config.tables.push(table);
        config.sharding_algorithms.insert(
            algorithm.into(),
            AlgorithmConfig::new(
                "INLINE",
                Props::new().with("algorithm-expression", expression),
            ),
        );
    }
    config.sharding_algorithms.insert(
        "database_inline".into(),
        AlgorithmConfig::new(
            "INLINE",
            Props::new().with("algorithm-expression", "ds_${user_id % 4}"),
        ),
    );

    config.auto_tables.push(AutoTableRuleConfig {
        logic_table: "t_log".into(),
        actual_data_sources: None,
        sharding_strategy: Some(ShardingStrategyConfig::standard("log_id", "log_mod")),
        key_generate_strategy: None,
    });
    config.sharding_algorithms.insert(
        "log_mod".into(),
        AlgorithmConfig::new("MOD", Props::new().with("sharding-count", 8_i64)),
    );
    config.key_generators.insert(
        "snowflake".into(),
        AlgorithmConfig::new("SNOWFLAKE", Props::new().with("worker-id", 7_i64)),
    );
    config
}

/// [`order_rule_config`] built over `ds_0` .. `ds_3`.
pub fn order_rule() -> ShardingRule {
    ShardingRule::new(&order_rule_config(), &data_sources(4)).unwrap()
}
