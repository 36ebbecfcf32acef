//! TOML deployment file for the `shardline` CLI.
//!
//! ```toml
//! data-sources = ["ds_0", "ds_1"]
//! database-type = "MySQL"
//!
//! [log]
//! level = "info"
//!
//! [props]
//! check-table-metadata-enabled = true
//!
//! [[rules.tables]]
//! logic-table = "t_order"
//! actual-data-nodes = "ds_${0..1}.t_order_${0..1}"
//! ```

use std::path::Path;

use anyhow::{Context, bail};
use serde::Deserialize;
use shardline_rule::ShardingRule;
use shardline_types::{ConfigProps, DatabaseType, ShardingRuleConfig};

/// Top-level deployment configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DeployConfig {
    /// Logging configuration.
    pub log: LogSection,
    /// Metadata loader switches.
    pub props: ConfigProps,
    /// Every data source the deployment knows about, in order.
    pub data_sources: Vec<String>,
    /// Dialect of the physical databases.
    pub database_type: DatabaseType,
    /// Sharding rule configuration.
    pub rules: ShardingRuleConfig,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl DeployConfig {
    /// Load the deployment file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: DeployConfig =
            toml::from_str(&content).with_context(|| format!("invalid {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let config: DeployConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the sharding rule this file describes.
    pub fn build_rule(&self) -> anyhow::Result<ShardingRule> {
        ShardingRule::new(&self.rules, &self.data_sources).context("invalid sharding rule")
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.data_sources.is_empty() {
            bail!("`data-sources` must list at least one data source");
        }
        for (i, name) in self.data_sources.iter().enumerate() {
            if name.trim().is_empty() {
                bail!("data source #{i} has an empty name");
            }
            if self.data_sources[..i].contains(name) {
                bail!("data source '{name}' is listed twice");
            }
        }
        Ok(())
    }
}
