//! Schema snapshots stored as TOML files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use shardline_types::{DataNode, DatabaseType, TableMetaData};
use tracing::debug;

use crate::SchemaLoader;
use crate::error::SchemaLoadError;

/// Reads `<root>/<data source>/<table>.toml`, one file per physical table.
///
/// A missing file means the table does not exist on that data source.
#[derive(Debug, Clone)]
pub struct FileSchemaLoader {
    root: PathBuf,
}

impl FileSchemaLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the snapshot for `data_node`.
    pub fn snapshot_path(&self, data_node: &DataNode) -> PathBuf {
        self.root
            .join(data_node.data_source_name())
            .join(format!("{}.toml", data_node.table_name()))
    }
}

#[async_trait::async_trait]
impl SchemaLoader for FileSchemaLoader {
    async fn load(
        &self,
        data_node: &DataNode,
        database_type: DatabaseType,
    ) -> Result<Option<TableMetaData>, SchemaLoadError> {
        let path = self.snapshot_path(data_node);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%data_node, path = %path.display(), "no schema snapshot");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let table: TableMetaData =
            toml::from_str(&contents).map_err(|e| SchemaLoadError::Decode {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(%data_node, %database_type, columns = table.columns.len(), "loaded schema snapshot");
        Ok(Some(table))
    }
}
