//! Round-robin layout for auto-sharded tables.

use shardline_types::DataNode;
use tracing::debug;

use crate::PlacementError;
use crate::expression::MAX_RANGE_LEN;

/// Lay out `amount` tables named `{logic_table}_{i}` over `data_sources`.
///
/// Table `i` lands on `data_sources[i % len]`, so the first source receives
/// index 0 and the distribution differs by at most one table per source.
/// The mapping depends only on `amount` and the order of `data_sources`.
/// Returns no nodes when `data_sources` is empty.
///
/// `amount` is capped at the same limit as a single expression range.
pub fn round_robin(
    logic_table: &str,
    amount: usize,
    data_sources: &[String],
) -> Result<Vec<DataNode>, PlacementError> {
    if amount as u64 > MAX_RANGE_LEN {
        return Err(PlacementError::TooManyTables {
            logic_table: logic_table.to_string(),
            amount: amount as u64,
            limit: MAX_RANGE_LEN,
        });
    }
    if data_sources.is_empty() {
        return Ok(Vec::new());
    }

    let nodes: Vec<DataNode> = data_sources
        .iter()
        .cycle()
        .take(amount)
        .enumerate()
        .map(|(i, ds)| DataNode::new(ds.clone(), format!("{logic_table}_{i}")))
        .collect();

    debug!(
        logic_table,
        amount,
        data_sources = data_sources.len(),
        "generated auto-table nodes"
    );
    Ok(nodes)
}
