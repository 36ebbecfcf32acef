//! Declarative sharding configuration.
//!
//! These types are what a deployment writes (usually as TOML) and what the
//! sharding rule is built from. They carry no behaviour beyond small
//! accessors: validation happens when the rule is constructed.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rule configuration
// ---------------------------------------------------------------------------

/// Top-level sharding rule configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ShardingRuleConfig {
    /// Tables with an explicit node expression.
    pub tables: Vec<TableRuleConfig>,
    /// Tables whose nodes are generated by an auto-table algorithm.
    pub auto_tables: Vec<AutoTableRuleConfig>,
    /// Comma-separated logical table lists that shard in lockstep.
    pub binding_table_groups: Vec<String>,
    /// Tables replicated identically onto every data source.
    pub broadcast_tables: Vec<String>,
    /// Database strategy for tables that don't declare one.
    pub default_database_strategy: Option<ShardingStrategyConfig>,
    /// Table strategy for tables that don't declare one.
    pub default_table_strategy: Option<ShardingStrategyConfig>,
    /// Key generation for tables that don't declare one.
    pub default_key_generate_strategy: Option<KeyGenerateStrategyConfig>,
    /// Named sharding algorithms referenced by strategies.
    pub sharding_algorithms: BTreeMap<String, AlgorithmConfig>,
    /// Named key generators referenced by key-generate strategies.
    pub key_generators: BTreeMap<String, AlgorithmConfig>,
}

/// A table whose physical nodes are declared by an inline expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableRuleConfig {
    /// Logical table name.
    pub logic_table: String,
    /// Node expression, e.g. `ds_${0..1}.t_order_${0..1}`.
    ///
    /// When absent the table is laid out like a broadcast table.
    #[serde(default)]
    pub actual_data_nodes: Option<String>,
    /// Overrides the default database strategy.
    #[serde(default)]
    pub database_strategy: Option<ShardingStrategyConfig>,
    /// Overrides the default table strategy.
    #[serde(default)]
    pub table_strategy: Option<ShardingStrategyConfig>,
    /// Overrides the default key generation.
    #[serde(default)]
    pub key_generate_strategy: Option<KeyGenerateStrategyConfig>,
}

impl TableRuleConfig {
    /// A table rule with only a node expression.
    pub fn new(logic_table: impl Into<String>, actual_data_nodes: impl Into<String>) -> Self {
        Self {
            logic_table: logic_table.into(),
            actual_data_nodes: Some(actual_data_nodes.into()),
            ..Default::default()
        }
    }
}

/// A table whose node count comes from an auto-table algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AutoTableRuleConfig {
    /// Logical table name.
    pub logic_table: String,
    /// Data-source expression; all rule data sources when absent or empty.
    #[serde(default)]
    pub actual_data_sources: Option<String>,
    /// Table strategy; its algorithm must be auto-table capable.
    #[serde(default)]
    pub sharding_strategy: Option<ShardingStrategyConfig>,
    /// Overrides the default key generation.
    #[serde(default)]
    pub key_generate_strategy: Option<KeyGenerateStrategyConfig>,
}

/// How a table (or database) is split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case"
)]
pub enum ShardingStrategyConfig {
    /// One sharding column.
    Standard {
        sharding_column: String,
        sharding_algorithm_name: String,
    },
    /// Several sharding columns, comma separated.
    Complex {
        sharding_columns: String,
        sharding_algorithm_name: String,
    },
    /// Sharding values supplied out of band.
    Hint { sharding_algorithm_name: String },
    /// No sharding.
    None,
}

impl ShardingStrategyConfig {
    /// Shorthand for a standard strategy.
    pub fn standard(column: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self::Standard {
            sharding_column: column.into(),
            sharding_algorithm_name: algorithm.into(),
        }
    }

    /// Name of the algorithm this strategy references, if any.
    pub fn sharding_algorithm_name(&self) -> Option<&str> {
        match self {
            Self::Standard {
                sharding_algorithm_name,
                ..
            }
            | Self::Complex {
                sharding_algorithm_name,
                ..
            }
            | Self::Hint {
                sharding_algorithm_name,
            } => Some(sharding_algorithm_name),
            Self::None => None,
        }
    }

    /// Whether this strategy actually shards.
    pub fn is_sharding(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether `column` is one of the strategy's sharding columns.
    ///
    /// Comparison is case-insensitive for both standard and complex strategies.
    pub fn is_sharding_column(&self, column: &str) -> bool {
        match self {
            Self::Standard {
                sharding_column, ..
            } => sharding_column.eq_ignore_ascii_case(column),
            Self::Complex {
                sharding_columns, ..
            } => sharding_columns
                .split(',')
                .map(str::trim)
                .any(|each| each.eq_ignore_ascii_case(column)),
            Self::Hint { .. } | Self::None => false,
        }
    }
}

/// Which column receives generated keys, and from which generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeyGenerateStrategyConfig {
    /// Column to fill.
    pub column: String,
    /// Name of a configured key generator; the rule default when absent.
    #[serde(default)]
    pub key_generator_name: Option<String>,
}

/// A named algorithm: its registry type string and properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Registry type, e.g. `"MOD"` or `"SNOWFLAKE"`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Algorithm-specific properties.
    #[serde(default)]
    pub props: Props,
}

impl AlgorithmConfig {
    /// Create an algorithm configuration.
    pub fn new(type_name: impl Into<String>, props: Props) -> Self {
        Self {
            type_name: type_name.into(),
            props,
        }
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// A single property value. TOML strings, integers and booleans are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Algorithm properties keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Props(BTreeMap<String, PropValue>);

impl Props {
    /// Empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a property.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw value lookup.
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    /// Value rendered as a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.0.get(key).map(ToString::to_string)
    }

    /// Integer value; numeric strings are accepted.
    ///
    /// Returns `Some(Err(raw))` when the property exists but is not an integer.
    pub fn get_i64(&self, key: &str) -> Option<Result<i64, String>> {
        self.0.get(key).map(|value| match value {
            PropValue::Int(v) => Ok(*v),
            PropValue::Text(s) => s.trim().parse().map_err(|_| s.clone()),
            PropValue::Bool(b) => Err(b.to_string()),
        })
    }

    /// Iterate over all properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropValue)> {
        self.0.iter()
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Runtime properties
// ---------------------------------------------------------------------------

/// Runtime switches consumed by the metadata loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigProps {
    /// Fetch every shard's schema and prove they agree.
    pub check_table_metadata_enabled: bool,
    /// Concurrent connections a single data source may serve per query.
    pub max_connections_size_per_query: usize,
    /// Per-node schema fetch timeout in milliseconds.
    pub metadata_load_timeout_ms: u64,
}

impl Default for ConfigProps {
    fn default() -> Self {
        Self {
            check_table_metadata_enabled: false,
            max_connections_size_per_query: 1,
            metadata_load_timeout_ms: 5_000,
        }
    }
}

impl ConfigProps {
    /// Effective connections per data source (never below 1).
    pub fn max_connections_size_per_query(&self) -> usize {
        self.max_connections_size_per_query.max(1)
    }

    /// Effective per-node fetch timeout.
    pub fn metadata_load_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_load_timeout_ms)
    }
}
