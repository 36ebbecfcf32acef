//! Canonicalization of physical table metadata into logical form.

use shardline_rule::TableRule;
use shardline_types::{ColumnMetaData, IndexMetaData, TableMetaData};

/// Decorate a schema loaded from one of `table_rule`'s nodes.
///
/// - the table takes the logical name;
/// - when the rule has a generated key column, each column's `generated`
///   flag is set by a case-insensitive match against it;
/// - index names lose a trailing `_{actual_table}` for any of the rule's
///   actual tables, and indexes are sorted by name.
///
/// Decorating an already decorated schema returns it unchanged.
pub fn decorate(raw: &TableMetaData, table_rule: &TableRule) -> TableMetaData {
    let columns = match table_rule.generate_key_column() {
        Some(key_column) => raw
            .columns
            .iter()
            .map(|column| ColumnMetaData {
                generated: column.name.eq_ignore_ascii_case(key_column),
                ..column.clone()
            })
            .collect(),
        None => raw.columns.clone(),
    };

    let mut indexes: Vec<IndexMetaData> = raw
        .indexes
        .iter()
        .map(|index| IndexMetaData::new(logic_index_name(&index.name, table_rule)))
        .collect();
    indexes.sort();

    TableMetaData::new(table_rule.logic_table(), columns, indexes)
}

/// Strip the longest `_{actual_table}` suffix; names without one are kept.
fn logic_index_name(index: &str, table_rule: &TableRule) -> String {
    table_rule
        .actual_tables()
        .iter()
        .filter_map(|actual| {
            let stem = index.strip_suffix(actual.as_str())?.strip_suffix('_')?;
            (!stem.is_empty()).then_some(stem)
        })
        .min_by_key(|stem| stem.len())
        .unwrap_or(index)
        .to_string()
}
