//! Process-wide handle to the current rule snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::ShardingRule;

/// Holds the live [`ShardingRule`] and swaps it whole on reconfiguration.
///
/// Readers take an `Arc` snapshot with [`current`](Self::current) and keep a
/// complete, consistent rule for as long as they hold it, even across a
/// concurrent [`replace`](Self::replace).
#[derive(Debug)]
pub struct RuleHolder {
    current: RwLock<Arc<ShardingRule>>,
    version: AtomicU64,
}

impl RuleHolder {
    /// Install the first rule at version 0.
    pub fn new(rule: ShardingRule) -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(Arc::new(rule)),
            version: AtomicU64::new(0),
        })
    }

    /// Snapshot of the live rule.
    pub fn current(&self) -> Arc<ShardingRule> {
        Arc::clone(&self.current.read().expect("lock poisoned"))
    }

    /// Install `rule`, returning the rule it replaced.
    pub fn replace(&self, rule: ShardingRule) -> Arc<ShardingRule> {
        let previous = {
            let mut current = self.current.write().expect("lock poisoned");
            std::mem::replace(&mut *current, Arc::new(rule))
        };
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        info!(version, "replaced sharding rule");
        previous
    }

    /// Number of replacements so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
