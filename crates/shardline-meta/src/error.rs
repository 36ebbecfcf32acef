//! Error types for metadata loading.

use std::fmt::Write as _;
use std::time::Duration;

use shardline_rule::RuleError;
use shardline_types::{DataNode, DatabaseType, TableMetaData};

/// Errors a [`SchemaLoader`](crate::SchemaLoader) may report for one node.
#[derive(Debug, thiserror::Error)]
pub enum SchemaLoadError {
    /// Reading the schema source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A schema snapshot could not be decoded.
    #[error("invalid schema snapshot {path}: {reason}")]
    Decode { path: String, reason: String },

    /// The data source could not be reached.
    #[error("data source '{0}' is unavailable")]
    Unavailable(String),
}

/// A shard whose decorated schema differs from the reference shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Where the differing schema was loaded from.
    pub data_node: DataNode,
    /// Its decorated schema.
    pub table: TableMetaData,
}

/// Errors produced while loading logical table metadata.
#[derive(Debug, thiserror::Error)]
pub enum MetaDataError {
    /// The table could not be resolved against the sharding rule.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Fetching one node's schema failed.
    #[error("failed to load table metadata of {data_node} ({database_type}): {source}")]
    Load {
        data_node: DataNode,
        database_type: DatabaseType,
        #[source]
        source: SchemaLoadError,
    },

    /// Fetching one node's schema took longer than allowed.
    #[error("loading table metadata of {data_node} ({database_type}) timed out after {timeout:?}")]
    Timeout {
        data_node: DataNode,
        database_type: DatabaseType,
        timeout: Duration,
    },

    /// The task fetching one node's schema did not complete.
    #[error("metadata task for {data_node} ({database_type}) failed: {reason}")]
    TaskFailed {
        data_node: DataNode,
        database_type: DatabaseType,
        reason: String,
    },

    /// Some shards have the table and others don't.
    #[error("logic table '{logic_table}' is missing on data nodes: {}", join_nodes(.missing))]
    MissingTables {
        logic_table: String,
        missing: Vec<DataNode>,
    },

    /// Shards disagree on the decorated schema.
    #[error(
        "cannot get uniformed table structure for logic table '{logic_table}', \
         the following data nodes differ from {reference}: {}",
        describe_violations(.violations)
    )]
    Inconsistent {
        logic_table: String,
        reference: DataNode,
        violations: Vec<Violation>,
    },
}

fn join_nodes(nodes: &[DataNode]) -> String {
    nodes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_violations(violations: &[Violation]) -> String {
    let mut out = String::new();
    for (i, violation) in violations.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{} {{ columns: [", violation.data_node);
        for (j, column) in violation.table.columns.iter().enumerate() {
            if j > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{} {}", column.name, column.data_type);
            if column.primary_key {
                out.push_str(" primary-key");
            }
            if column.generated {
                out.push_str(" generated");
            }
            if column.case_sensitive {
                out.push_str(" case-sensitive");
            }
        }
        out.push_str("], indexes: [");
        let indexes: Vec<&str> = violation
            .table
            .indexes
            .iter()
            .map(|index| index.name.as_str())
            .collect();
        out.push_str(&indexes.join(", "));
        out.push_str("] }");
    }
    out
}
