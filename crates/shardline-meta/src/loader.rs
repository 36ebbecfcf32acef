//! Logical table metadata with an optional cross-shard uniformity check.
//!
//! With the check disabled, the schema of a table's first data node is
//! decorated and returned. With it enabled, every data node is fetched
//! concurrently, all results are decorated, and the first node's schema is
//! the reference every other node must equal.
//!
//! Concurrency is bounded twice: a pool of
//! `min(2 × cores, data sources × max connections per query)` permits shared
//! by the whole call, and `max connections per query` permits per data
//! source. Each fetch has its own timeout. Results are awaited in submission
//! order; the first failure ends the call while tasks still in flight run to
//! completion or to their timeout in the background.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use shardline_rule::{ShardingRule, TableRule};
use shardline_types::{ConfigProps, DataNode, DatabaseType, TableMetaData};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::SchemaLoader;
use crate::decorator::decorate;
use crate::error::{MetaDataError, SchemaLoadError, Violation};

type Result<T> = std::result::Result<T, MetaDataError>;

/// Why a single node's fetch did not produce a schema.
enum FetchError {
    Load(SchemaLoadError),
    Timeout,
    PoolClosed,
}

/// Loads logical table metadata for a sharding rule.
pub struct ShardingMetaDataLoader {
    schema_loader: Arc<dyn SchemaLoader>,
    database_type: DatabaseType,
    props: ConfigProps,
}

impl ShardingMetaDataLoader {
    pub fn new(
        schema_loader: Arc<dyn SchemaLoader>,
        database_type: DatabaseType,
        props: ConfigProps,
    ) -> Self {
        Self {
            schema_loader,
            database_type,
            props,
        }
    }

    pub fn props(&self) -> &ConfigProps {
        &self.props
    }

    /// Logical schema of `logic_table`, or `None` if no data node has it.
    pub async fn load(
        &self,
        rule: &ShardingRule,
        logic_table: &str,
    ) -> Result<Option<TableMetaData>> {
        let table_rule = rule.get_table_rule(logic_table)?;
        if self.props.check_table_metadata_enabled {
            self.load_checked(table_rule).await
        } else {
            self.load_first(table_rule).await
        }
    }

    /// Logical schema of every table rule and broadcast table, loaded one
    /// table at a time. Tables no data node has are left out.
    pub async fn load_all(&self, rule: &ShardingRule) -> Result<BTreeMap<String, TableMetaData>> {
        let mut result = BTreeMap::new();
        let names = rule
            .get_tables()
            .into_iter()
            .chain(rule.broadcast_tables().iter().map(String::as_str));
        for name in names {
            if let Some(table) = self.load(rule, name).await? {
                result.insert(table.name.clone(), table);
            }
        }
        info!(tables = result.len(), "loaded all table metadata");
        Ok(result)
    }

    async fn load_first(&self, table_rule: &TableRule) -> Result<Option<TableMetaData>> {
        let Some(data_node) = table_rule.actual_data_nodes().first() else {
            return Ok(None);
        };
        let timeout = self.props.metadata_load_timeout();
        let raw = fetch(
            Arc::clone(&self.schema_loader),
            data_node.clone(),
            self.database_type,
            timeout,
        )
        .await
        .map_err(|e| self.fetch_error(data_node, timeout, e))?;
        debug!(logic_table = %table_rule.logic_table(), %data_node, "loaded table metadata from first data node");
        Ok(raw.map(|table| decorate(&table, table_rule)))
    }

    async fn load_checked(&self, table_rule: &TableRule) -> Result<Option<TableMetaData>> {
        let logic_table = table_rule.logic_table();
        let max_connections = self.props.max_connections_size_per_query();
        let source_limits: HashMap<&str, Arc<Semaphore>> = table_rule
            .actual_data_source_names()
            .iter()
            .map(|ds| (ds.as_str(), Arc::new(Semaphore::new(max_connections))))
            .collect();
        let pool_size = pool_size(source_limits.len(), max_connections);
        let pool = Arc::new(Semaphore::new(pool_size));
        let timeout = self.props.metadata_load_timeout();
        debug!(
            %logic_table,
            nodes = table_rule.actual_data_nodes().len(),
            pool_size,
            max_connections,
            "checking table metadata on every data node"
        );

        let mut handles = Vec::with_capacity(table_rule.actual_data_nodes().len());
        for data_node in table_rule.actual_data_nodes() {
            let pool = Arc::clone(&pool);
            let source_limit = source_limits
                .get(data_node.data_source_name())
                .map(Arc::clone)
                .unwrap_or_else(|| Arc::new(Semaphore::new(max_connections)));
            let schema_loader = Arc::clone(&self.schema_loader);
            let node = data_node.clone();
            let database_type = self.database_type;
            let handle = tokio::spawn(async move {
                let _source = source_limit
                    .acquire_owned()
                    .await
                    .map_err(|_| FetchError::PoolClosed)?;
                let _slot = pool
                    .acquire_owned()
                    .await
                    .map_err(|_| FetchError::PoolClosed)?;
                fetch(schema_loader, node, database_type, timeout).await
            });
            handles.push((data_node, handle));
        }

        let mut loaded: Vec<(DataNode, TableMetaData)> = Vec::with_capacity(handles.len());
        let mut missing = Vec::new();
        for (data_node, handle) in handles {
            let outcome = handle.await.map_err(|e| MetaDataError::TaskFailed {
                data_node: data_node.clone(),
                database_type: self.database_type,
                reason: e.to_string(),
            })?;
            match outcome.map_err(|e| self.fetch_error(data_node, timeout, e))? {
                Some(raw) => loaded.push((data_node.clone(), raw)),
                None => missing.push(data_node.clone()),
            }
        }

        if loaded.is_empty() {
            debug!(%logic_table, "table does not exist on any data node");
            return Ok(None);
        }
        if !missing.is_empty() {
            for data_node in &missing {
                warn!(%logic_table, %data_node, "table missing on data node");
            }
            return Err(MetaDataError::MissingTables {
                logic_table: logic_table.to_string(),
                missing,
            });
        }

        check_uniformity(table_rule, loaded).map(Some)
    }

    fn fetch_error(
        &self,
        data_node: &DataNode,
        timeout: Duration,
        error: FetchError,
    ) -> MetaDataError {
        let data_node = data_node.clone();
        let database_type = self.database_type;
        match error {
            FetchError::Load(source) => MetaDataError::Load {
                data_node,
                database_type,
                source,
            },
            FetchError::Timeout => MetaDataError::Timeout {
                data_node,
                database_type,
                timeout,
            },
            FetchError::PoolClosed => MetaDataError::TaskFailed {
                data_node,
                database_type,
                reason: "connection pool closed".into(),
            },
        }
    }
}

/// Worker pool size for one checked load.
fn pool_size(data_sources: usize, max_connections: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    (cores * 2).min(data_sources * max_connections).max(1)
}

async fn fetch(
    schema_loader: Arc<dyn SchemaLoader>,
    data_node: DataNode,
    database_type: DatabaseType,
    timeout: Duration,
) -> std::result::Result<Option<TableMetaData>, FetchError> {
    match tokio::time::timeout(timeout, schema_loader.load(&data_node, database_type)).await {
        Ok(result) => result.map_err(FetchError::Load),
        Err(_) => Err(FetchError::Timeout),
    }
}

/// Decorate every loaded schema and compare each with the first.
fn check_uniformity(
    table_rule: &TableRule,
    loaded: Vec<(DataNode, TableMetaData)>,
) -> Result<TableMetaData> {
    let logic_table = table_rule.logic_table();
    let mut decorated = loaded
        .into_iter()
        .map(|(data_node, raw)| (data_node, decorate(&raw, table_rule)));
    let Some((reference, sample)) = decorated.next() else {
        return Err(MetaDataError::MissingTables {
            logic_table: logic_table.to_string(),
            missing: table_rule.actual_data_nodes().to_vec(),
        });
    };

    let violations: Vec<Violation> = decorated
        .filter(|(_, table)| *table != sample)
        .map(|(data_node, table)| Violation { data_node, table })
        .collect();

    if !violations.is_empty() {
        for violation in &violations {
            warn!(
                %logic_table,
                data_node = %violation.data_node,
                %reference,
                "table metadata differs from reference"
            );
        }
        return Err(MetaDataError::Inconsistent {
            logic_table: logic_table.to_string(),
            reference,
            violations,
        });
    }

    info!(
        %logic_table,
        nodes = table_rule.actual_data_nodes().len(),
        "table metadata is uniform across data nodes"
    );
    Ok(sample)
}
