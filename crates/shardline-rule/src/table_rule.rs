//! Per-logical-table node mapping.
//!
//! A [`TableRule`] is built in one of three modes:
//!
//! - **broadcast**: one node per data source, each named after the logical
//!   table;
//! - **explicit**: nodes expanded from the table's node expression;
//! - **auto**: `{logic_table}_{i}` for `i` in `0..amount`, placed round-robin
//!   over the configured data sources.
//!
//! Every derived index is filled in the same pass that collects the node
//! list, so they always agree with it.

use std::collections::{BTreeSet, HashMap};

use shardline_algorithm::AutoTableAlgorithm;
use shardline_placement::{PlacementError, expand_data_nodes, round_robin, split_and_evaluate};
use shardline_types::{
    AutoTableRuleConfig, DataNode, KeyGenerateStrategyConfig, ShardingStrategyConfig,
    TableRuleConfig,
};
use tracing::debug;

use crate::RuleError;

type Result<T> = std::result::Result<T, RuleError>;

/// Physical layout and strategies of one logical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRule {
    logic_table: String,
    actual_data_nodes: Vec<DataNode>,
    data_node_index: HashMap<DataNode, usize>,
    actual_tables: BTreeSet<String>,
    actual_data_sources: Vec<String>,
    data_source_to_tables: HashMap<String, Vec<String>>,
    database_strategy: Option<ShardingStrategyConfig>,
    table_strategy: Option<ShardingStrategyConfig>,
    generate_key_column: Option<String>,
    key_generator_name: Option<String>,
}

impl TableRule {
    /// A table replicated on every data source under its logical name.
    pub fn broadcast(logic_table: &str, data_source_names: &[String]) -> Self {
        let logic_table = logic_table.to_lowercase();
        let nodes = broadcast_nodes(&logic_table, data_source_names);
        Self::assemble(logic_table, nodes, None, None, None, None)
    }

    /// A table whose nodes come from its declared node expression.
    ///
    /// A missing or blank expression falls back to broadcast layout, which is
    /// only legal when no table sharding strategy is configured.
    pub fn from_config(
        config: &TableRuleConfig,
        data_source_names: &[String],
        default_generate_key_column: Option<&str>,
    ) -> Result<Self> {
        let logic_table = config.logic_table.to_lowercase();
        let declared = match config.actual_data_nodes.as_deref().map(str::trim) {
            Some(expression) if !expression.is_empty() => {
                expand_data_nodes(expression, data_source_names)?
            }
            _ => Vec::new(),
        };
        check_rule(&logic_table, &declared, config.table_strategy.as_ref())?;

        let nodes = if declared.is_empty() {
            broadcast_nodes(&logic_table, data_source_names)
        } else {
            declared
        };
        let (generate_key_column, key_generator_name) = key_generate(
            config.key_generate_strategy.as_ref(),
            default_generate_key_column,
        );
        let rule = Self::assemble(
            logic_table,
            nodes,
            config.database_strategy.clone(),
            config.table_strategy.clone(),
            generate_key_column,
            key_generator_name,
        );
        debug!(logic_table = %rule.logic_table, nodes = rule.actual_data_nodes.len(), "built table rule");
        Ok(rule)
    }

    /// A table whose nodes are generated from an auto-table algorithm.
    ///
    /// The database strategy is always "none". Tables are placed over the
    /// table's own data sources if it declares any, else over all of them.
    /// Without an algorithm no tables are generated and the layout falls back
    /// to broadcast; [`ShardingRule`](crate::ShardingRule) never builds one
    /// that way.
    pub fn from_auto_config(
        config: &AutoTableRuleConfig,
        data_source_names: &[String],
        algorithm: Option<&dyn AutoTableAlgorithm>,
        default_generate_key_column: Option<&str>,
    ) -> Result<Self> {
        let logic_table = config.logic_table.to_lowercase();
        let generated = match algorithm {
            Some(algorithm) => {
                let sources = match config.actual_data_sources.as_deref().map(str::trim) {
                    Some(expression) if !expression.is_empty() => split_and_evaluate(expression)?,
                    _ => data_source_names.to_vec(),
                };
                let nodes = round_robin(&logic_table, algorithm.auto_tables_amount(), &sources)?;
                for node in &nodes {
                    if !data_source_names
                        .iter()
                        .any(|each| each == node.data_source_name())
                    {
                        return Err(PlacementError::UnknownDataSource {
                            data_node: node.to_string(),
                        }
                        .into());
                    }
                }
                nodes
            }
            None => Vec::new(),
        };
        check_rule(&logic_table, &generated, config.sharding_strategy.as_ref())?;

        let nodes = if generated.is_empty() {
            broadcast_nodes(&logic_table, data_source_names)
        } else {
            generated
        };
        let (generate_key_column, key_generator_name) = key_generate(
            config.key_generate_strategy.as_ref(),
            default_generate_key_column,
        );
        let rule = Self::assemble(
            logic_table,
            nodes,
            Some(ShardingStrategyConfig::None),
            config.sharding_strategy.clone(),
            generate_key_column,
            key_generator_name,
        );
        debug!(logic_table = %rule.logic_table, nodes = rule.actual_data_nodes.len(), "built auto table rule");
        Ok(rule)
    }

    /// Fill the node list and every derived index in one pass.
    fn assemble(
        logic_table: String,
        nodes: Vec<DataNode>,
        database_strategy: Option<ShardingStrategyConfig>,
        table_strategy: Option<ShardingStrategyConfig>,
        generate_key_column: Option<String>,
        key_generator_name: Option<String>,
    ) -> Self {
        let mut data_node_index = HashMap::with_capacity(nodes.len());
        let mut actual_tables = BTreeSet::new();
        let mut actual_data_sources = Vec::new();
        let mut data_source_to_tables: HashMap<String, Vec<String>> = HashMap::new();

        for (index, node) in nodes.iter().enumerate() {
            data_node_index.insert(node.clone(), index);
            actual_tables.insert(node.table_name().to_string());
            let tables = data_source_to_tables
                .entry(node.data_source_name().to_string())
                .or_insert_with(|| {
                    actual_data_sources.push(node.data_source_name().to_string());
                    Vec::new()
                });
            if !tables.iter().any(|each| each == node.table_name()) {
                tables.push(node.table_name().to_string());
            }
        }

        Self {
            logic_table,
            actual_data_nodes: nodes,
            data_node_index,
            actual_tables,
            actual_data_sources,
            data_source_to_tables,
            database_strategy,
            table_strategy,
            generate_key_column,
            key_generator_name,
        }
    }

    /// Lower-cased logical table name.
    pub fn logic_table(&self) -> &str {
        &self.logic_table
    }

    /// Nodes in declaration order.
    pub fn actual_data_nodes(&self) -> &[DataNode] {
        &self.actual_data_nodes
    }

    /// Ordinal position of every node.
    pub fn data_node_index(&self) -> &HashMap<DataNode, usize> {
        &self.data_node_index
    }

    /// Ordinal position of `data_source.actual_table`, if it is a node here.
    pub fn find_actual_table_index(&self, data_source: &str, actual_table: &str) -> Option<usize> {
        self.data_node_index
            .get(&DataNode::new(data_source, actual_table))
            .copied()
    }

    /// Distinct data sources, first-seen order.
    pub fn actual_data_source_names(&self) -> &[String] {
        &self.actual_data_sources
    }

    /// Distinct actual table names.
    pub fn actual_tables(&self) -> &BTreeSet<String> {
        &self.actual_tables
    }

    /// Actual tables hosted on `data_source`, in node order.
    pub fn actual_table_names(&self, data_source: &str) -> &[String] {
        self.data_source_to_tables
            .get(data_source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Nodes grouped by data source, both in node order.
    pub fn data_node_groups(&self) -> Vec<(&str, Vec<&DataNode>)> {
        self.actual_data_sources
            .iter()
            .map(|ds| {
                let nodes = self
                    .actual_data_nodes
                    .iter()
                    .filter(|node| node.data_source_name() == ds)
                    .collect();
                (ds.as_str(), nodes)
            })
            .collect()
    }

    /// Whether `actual_table` is one of this rule's tables, ignoring case.
    pub fn is_existed(&self, actual_table: &str) -> bool {
        let actual_table = actual_table.to_lowercase();
        self.actual_tables
            .iter()
            .any(|each| each.to_lowercase() == actual_table)
    }

    /// The node at index 0.
    pub fn first_data_node(&self) -> Result<&DataNode> {
        self.actual_data_nodes
            .first()
            .ok_or_else(|| RuleError::NoDataNodes(self.logic_table.clone()))
    }

    /// The table's own database strategy; `None` means inherit the default.
    pub fn database_strategy(&self) -> Option<&ShardingStrategyConfig> {
        self.database_strategy.as_ref()
    }

    /// The table's own table strategy; `None` means inherit the default.
    pub fn table_strategy(&self) -> Option<&ShardingStrategyConfig> {
        self.table_strategy.as_ref()
    }

    pub fn generate_key_column(&self) -> Option<&str> {
        self.generate_key_column.as_deref()
    }

    pub fn key_generator_name(&self) -> Option<&str> {
        self.key_generator_name.as_deref()
    }
}

fn broadcast_nodes(logic_table: &str, data_source_names: &[String]) -> Vec<DataNode> {
    data_source_names
        .iter()
        .map(|ds| DataNode::new(ds.clone(), logic_table))
        .collect()
}

/// A sharded table must have nodes of its own.
fn check_rule(
    logic_table: &str,
    nodes: &[DataNode],
    table_strategy: Option<&ShardingStrategyConfig>,
) -> Result<()> {
    if nodes.is_empty() && table_strategy.is_some_and(ShardingStrategyConfig::is_sharding) {
        return Err(RuleError::MissingDataNodes(logic_table.to_string()));
    }
    Ok(())
}

fn key_generate(
    config: Option<&KeyGenerateStrategyConfig>,
    default_column: Option<&str>,
) -> (Option<String>, Option<String>) {
    let column = config
        .map(|each| each.column.trim())
        .filter(|column| !column.is_empty())
        .or(default_column)
        .map(str::to_string);
    let generator = config.and_then(|each| each.key_generator_name.clone());
    (column, generator)
}
