//! Algorithm capability traits and the values they exchange.

use std::fmt;

use crate::AlgorithmError;

/// A value of a sharding column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShardingValue {
    Int(i64),
    Text(String),
}

impl ShardingValue {
    /// Integer view; numeric text is accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ShardingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ShardingValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for ShardingValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// A generated key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeneratedKey {
    Long(i64),
    Text(String),
}

impl fmt::Display for GeneratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Picks one target (data source or table) for a sharding value.
pub trait ShardingAlgorithm: Send + Sync + fmt::Debug {
    /// Registry type string.
    fn type_name(&self) -> &'static str;

    /// Choose the target in `available_targets` that holds `value`.
    fn do_sharding(
        &self,
        available_targets: &[String],
        value: &ShardingValue,
    ) -> Result<String, AlgorithmError>;

    /// This algorithm viewed as an auto-table algorithm, if it is one.
    fn as_auto_table(&self) -> Option<&dyn AutoTableAlgorithm> {
        None
    }
}

/// A sharding algorithm that determines how many tables it shards over.
pub trait AutoTableAlgorithm: ShardingAlgorithm {
    /// Number of physical tables to generate.
    fn auto_tables_amount(&self) -> usize;
}

/// Produces values for generated key columns.
pub trait KeyGenerateAlgorithm: Send + Sync + fmt::Debug {
    /// Registry type string.
    fn type_name(&self) -> &'static str;

    /// Generate the next key.
    fn generate_key(&self) -> Result<GeneratedKey, AlgorithmError>;
}
