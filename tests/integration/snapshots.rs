//! Integration test: schema snapshot files.
//!
//! Physical schemas are written as TOML snapshots under a temporary
//! directory and read back through the file schema loader.

use std::path::Path;
use std::sync::Arc;

use shardline_integration_tests::{order_rule, physical_table, props};
use shardline_meta::{FileSchemaLoader, MetaDataError, ShardingMetaDataLoader};
use shardline_rule::ShardingRule;
use shardline_types::*;

/// Write one snapshot per data node of `logic_table`.
fn write_snapshots(root: &Path, rule: &ShardingRule, logic_table: &str) {
    let files = FileSchemaLoader::new(root);
    for node in rule.get_table_rule(logic_table).unwrap().actual_data_nodes() {
        let path = files.snapshot_path(node);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let text = toml::to_string(&physical_table(node.table_name())).unwrap();
        std::fs::write(path, text).unwrap();
    }
}

fn loader(root: &Path, check: bool) -> ShardingMetaDataLoader {
    ShardingMetaDataLoader::new(
        Arc::new(FileSchemaLoader::new(root)),
        DatabaseType::PostgreSql,
        props(check),
    )
}

#[tokio::test]
async fn test_verify_from_snapshot_files() {
    let dir = tempfile::tempdir().unwrap();
    let rule = order_rule();
    write_snapshots(dir.path(), &rule, "t_log");

    let table = loader(dir.path(), true)
        .load(&rule, "t_log")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(table.name, "t_log");
    assert_eq!(table.primary_key_columns(), vec!["order_id"]);
    assert_eq!(
        table.indexes,
        vec![IndexMetaData::new("status_idx"), IndexMetaData::new("user_idx")]
    );
}

#[tokio::test]
async fn test_edited_snapshot_breaks_uniformity() {
    let dir = tempfile::tempdir().unwrap();
    let rule = order_rule();
    write_snapshots(dir.path(), &rule, "t_log");

    let edited = DataNode::new("ds_2", "t_log_6");
    let mut table = physical_table("t_log_6");
    table.columns.push(ColumnMetaData::new("note", "text"));
    std::fs::write(
        FileSchemaLoader::new(dir.path()).snapshot_path(&edited),
        toml::to_string(&table).unwrap(),
    )
    .unwrap();

    let err = loader(dir.path(), true)
        .load(&rule, "t_log")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MetaDataError::Inconsistent { ref violations, .. }
            if violations.len() == 1 && violations[0].data_node == edited
    ));

    // Without the check only the first snapshot is read.
    assert!(loader(dir.path(), false).load(&rule, "t_log").await.is_ok());
}

#[tokio::test]
async fn test_corrupt_snapshot_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let rule = order_rule();
    write_snapshots(dir.path(), &rule, "t_log");
    let corrupt = DataNode::new("ds_1", "t_log_1");
    std::fs::write(
        FileSchemaLoader::new(dir.path()).snapshot_path(&corrupt),
        "name = [",
    )
    .unwrap();

    let err = loader(dir.path(), true)
        .load(&rule, "t_log")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MetaDataError::Load { ref data_node, database_type: DatabaseType::PostgreSql, .. }
            if data_node == &corrupt
    ));
}

#[tokio::test]
async fn test_missing_directory_means_absent_table() {
    let dir = tempfile::tempdir().unwrap();
    let rule = order_rule();
    assert!(
        loader(&dir.path().join("nothing"), true)
            .load(&rule, "t_order")
            .await
            .unwrap()
            .is_none()
    );
}
