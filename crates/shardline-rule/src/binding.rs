//! Groups of logical tables that shard in lockstep.

use std::sync::Arc;

use crate::{RuleError, TableRule};

type Result<T> = std::result::Result<T, RuleError>;

/// An ordered group of table rules with identical placement per index.
///
/// For any index `i`, every sharded member's `i`-th node lives on the same
/// data source, so a join across members can be rewritten shard by shard.
/// Broadcast members exist on every data source under their logical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTableRule {
    table_rules: Vec<Arc<TableRule>>,
    sharded: Vec<bool>,
}

impl BindingTableRule {
    /// Build a group, checking that its sharded members are in lockstep.
    ///
    /// `sharded` flags members that own their nodes; broadcast members are
    /// exempt from the lockstep check. `group` is used in error messages.
    pub(crate) fn new(group: &str, members: Vec<(Arc<TableRule>, bool)>) -> Result<Self> {
        let mut reference: Option<&TableRule> = None;
        for (rule, sharded) in &members {
            if !sharded {
                continue;
            }
            let Some(first) = reference else {
                reference = Some(rule.as_ref());
                continue;
            };
            check_lockstep(group, first, rule)?;
        }
        let (table_rules, sharded) = members.into_iter().unzip();
        Ok(Self {
            table_rules,
            sharded,
        })
    }

    /// Member rules in declaration order.
    pub fn table_rules(&self) -> &[Arc<TableRule>] {
        &self.table_rules
    }

    /// Whether `logic_table` is a member, ignoring case.
    pub fn has_logic_table(&self, logic_table: &str) -> bool {
        self.position(logic_table).is_some()
    }

    /// Lower-cased names of all members.
    pub fn all_logic_tables(&self) -> Vec<&str> {
        self.table_rules.iter().map(|each| each.logic_table()).collect()
    }

    /// The actual table of `logic_table` co-located with
    /// `other_actual_table`, which belongs to `other_logic_table`.
    ///
    /// A broadcast target resolves to its logical name. A sharded target
    /// driven by a broadcast member resolves to its first table on
    /// `data_source`.
    pub fn binding_actual_table(
        &self,
        data_source: &str,
        logic_table: &str,
        other_logic_table: &str,
        other_actual_table: &str,
    ) -> Result<String> {
        let not_found = || RuleError::ActualTableNotFound {
            data_source: data_source.to_string(),
            logic_table: other_logic_table.to_lowercase(),
            actual_table: other_actual_table.to_string(),
        };
        let driving = self.position(other_logic_table).ok_or_else(not_found)?;
        let index = self.table_rules[driving]
            .find_actual_table_index(data_source, other_actual_table)
            .ok_or_else(not_found)?;
        let target = self
            .position(logic_table)
            .ok_or_else(|| RuleError::NoTableRule(logic_table.to_lowercase()))?;
        let rule = &self.table_rules[target];

        if !self.sharded[target] {
            return Ok(rule.logic_table().to_string());
        }
        let actual = if self.sharded[driving] {
            rule.actual_data_nodes()
                .get(index)
                .map(|node| node.table_name())
                .ok_or_else(not_found)?
        } else {
            rule.actual_table_names(data_source)
                .first()
                .map(String::as_str)
                .ok_or_else(|| RuleError::NoDataNode {
                    data_source: data_source.to_string(),
                    logic_table: rule.logic_table().to_string(),
                })?
        };
        Ok(actual.to_lowercase())
    }

    /// For each candidate other than `logic_table`, the actual table
    /// co-located with `data_source.actual_table`. Candidates outside the
    /// group are skipped; output follows candidate order without duplicates.
    pub fn logic_and_actual_tables(
        &self,
        data_source: &str,
        logic_table: &str,
        actual_table: &str,
        candidates: &[&str],
    ) -> Result<Vec<(String, String)>> {
        let driving = logic_table.to_lowercase();
        let mut result: Vec<(String, String)> = Vec::new();
        for candidate in candidates {
            let candidate = candidate.to_lowercase();
            if candidate == driving
                || !self.has_logic_table(&candidate)
                || result.iter().any(|(each, _)| *each == candidate)
            {
                continue;
            }
            let actual =
                self.binding_actual_table(data_source, &candidate, logic_table, actual_table)?;
            result.push((candidate, actual));
        }
        Ok(result)
    }

    /// Member names are stored lower-cased.
    fn position(&self, logic_table: &str) -> Option<usize> {
        let logic_table = logic_table.to_lowercase();
        self.table_rules
            .iter()
            .position(|each| each.logic_table() == logic_table)
    }
}

fn check_lockstep(group: &str, first: &TableRule, other: &TableRule) -> Result<()> {
    let inconsistent = |reason: String| RuleError::InconsistentBindingTables {
        group: group.to_string(),
        reason,
    };
    let (left, right) = (first.actual_data_nodes(), other.actual_data_nodes());
    if left.len() != right.len() {
        return Err(inconsistent(format!(
            "'{}' has {} data nodes but '{}' has {}",
            first.logic_table(),
            left.len(),
            other.logic_table(),
            right.len()
        )));
    }
    for (index, (a, b)) in left.iter().zip(right).enumerate() {
        if a.data_source_name() != b.data_source_name() {
            return Err(inconsistent(format!(
                "node {index} of '{}' is on '{}' but on '{}' for '{}'",
                first.logic_table(),
                a.data_source_name(),
                b.data_source_name(),
                other.logic_table()
            )));
        }
    }
    Ok(())
}
