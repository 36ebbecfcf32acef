//! Error types for rule construction and lookup.

use shardline_algorithm::AlgorithmError;
use shardline_placement::PlacementError;
use shardline_types::DataNodeError;

/// Configuration errors raised while building or querying a sharding rule.
///
/// Every variant is fatal for the operation that produced it; nothing here is
/// retried.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The resource layer supplied no data sources.
    #[error("sharding rule requires at least one data source")]
    MissingDataSources,

    /// A node expression could not be expanded or names an unknown source.
    #[error(transparent)]
    Placement(#[from] PlacementError),

    /// An algorithm could not be instantiated or invoked.
    #[error(transparent)]
    Algorithm(#[from] AlgorithmError),

    /// A literal data node is malformed.
    #[error(transparent)]
    DataNode(#[from] DataNodeError),

    /// A strategy references an algorithm name that is not configured.
    #[error("sharding algorithm '{name}' is not configured")]
    UnknownShardingAlgorithm { name: String },

    /// A key-generate strategy references an unconfigured generator name.
    #[error("key generator '{name}' is not configured")]
    UnknownKeyGenerator { name: String },

    /// An auto table's algorithm cannot compute a table amount.
    #[error(
        "auto table '{logic_table}' requires an auto-table algorithm, '{algorithm}' is not one"
    )]
    NotAutoTableAlgorithm {
        logic_table: String,
        algorithm: String,
    },

    /// A sharded table resolved to no data nodes.
    #[error("logic table '{0}' has a table sharding strategy but no actual data nodes")]
    MissingDataNodes(String),

    /// Two table rules share a logical name.
    #[error("logic table '{0}' is configured more than once")]
    DuplicateLogicTable(String),

    /// A binding group names a table with no rule and no broadcast entry.
    #[error("binding table group '{group}' references unknown logic table '{table}'")]
    UnknownBindingTable { group: String, table: String },

    /// Members of a binding group are not laid out in lockstep.
    #[error("binding table group '{group}' is inconsistent: {reason}")]
    InconsistentBindingTables { group: String, reason: String },

    /// No table rule and no broadcast entry for a logical table.
    #[error("cannot find table rule with logic table: '{0}'")]
    NoTableRule(String),

    /// A table rule resolved to an empty node list.
    #[error("logic table '{0}' has no data nodes")]
    NoDataNodes(String),

    /// A logical table has no node on the requested data source.
    #[error(
        "cannot find actual data node for data source name: '{data_source}' and logic table name: '{logic_table}'"
    )]
    NoDataNode {
        data_source: String,
        logic_table: String,
    },

    /// A driving actual table does not belong to its binding table.
    #[error("actual table [{data_source}].[{actual_table}] is not in table rule '{logic_table}'")]
    ActualTableNotFound {
        data_source: String,
        logic_table: String,
        actual_table: String,
    },
}
