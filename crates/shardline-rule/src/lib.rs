//! Sharding rules for shardline.
//!
//! Turns a [`ShardingRuleConfig`](shardline_types::ShardingRuleConfig) and
//! the set of known data sources into an immutable [`ShardingRule`]: one
//! [`TableRule`] per logical table, the [`BindingTableRule`] groups, the
//! broadcast tables and the instantiated algorithms. Construction is pure and
//! fails fast on any configuration error.
//!
//! [`RuleHolder`] keeps the live rule and replaces it atomically when the
//! configuration changes.

mod binding;
mod error;
mod holder;
mod sharding_rule;
mod table_rule;

pub use binding::BindingTableRule;
pub use error::RuleError;
pub use holder::RuleHolder;
pub use sharding_rule::ShardingRule;
pub use table_rule::TableRule;
