//! Shared types for shardline.
//!
//! This crate defines the vocabulary used across the workspace:
//! physical locations ([`DataNode`]), the declarative sharding configuration
//! ([`ShardingRuleConfig`] and friends), runtime properties ([`ConfigProps`])
//! and the schema snapshots exchanged with the metadata loader
//! ([`TableMetaData`], [`ColumnMetaData`], [`IndexMetaData`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod config;
mod schema;

pub use config::{
    AlgorithmConfig, AutoTableRuleConfig, ConfigProps, KeyGenerateStrategyConfig, PropValue,
    Props, ShardingRuleConfig, ShardingStrategyConfig, TableRuleConfig,
};
pub use schema::{ColumnMetaData, DatabaseType, IndexMetaData, TableMetaData};

// ---------------------------------------------------------------------------
// Data node
// ---------------------------------------------------------------------------

/// Separator between the data source and the table in a node literal.
pub const DATA_NODE_DELIMITER: char = '.';

/// Errors produced when parsing a node literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataNodeError {
    /// The literal is not of the form `data_source.table`.
    #[error("invalid format for actual data node: '{0}'")]
    InvalidFormat(String),
}

/// One physical location of a logical table: `(data source, table)`.
///
/// Parsed from and displayed as `data_source.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataNode {
    data_source_name: String,
    table_name: String,
}

impl DataNode {
    /// Create a node from its two parts.
    pub fn new(data_source_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            data_source_name: data_source_name.into(),
            table_name: table_name.into(),
        }
    }

    /// Parse a `data_source.table` literal.
    ///
    /// Exactly one delimiter with non-empty text on both sides is accepted.
    pub fn parse(literal: &str) -> Result<Self, DataNodeError> {
        let mut parts = literal.split(DATA_NODE_DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ds), Some(table), None) if !ds.is_empty() && !table.is_empty() => {
                Ok(Self::new(ds, table))
            }
            _ => Err(DataNodeError::InvalidFormat(literal.to_string())),
        }
    }

    /// Name of the data source hosting this node.
    pub fn data_source_name(&self) -> &str {
        &self.data_source_name
    }

    /// Physical table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl FromStr for DataNode {
    type Err = DataNodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.data_source_name, DATA_NODE_DELIMITER, self.table_name
        )
    }
}
