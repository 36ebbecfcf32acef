//! Schema source abstraction.

use shardline_types::{DataNode, DatabaseType, TableMetaData};

use crate::error::SchemaLoadError;

/// Fetches the raw schema of one physical table.
///
/// Each call is expected to use its own connection; the metadata loader
/// invokes it concurrently for different nodes of the same table.
#[async_trait::async_trait]
pub trait SchemaLoader: Send + Sync {
    /// Load the schema of `data_node`. Returns `None` if the table does not
    /// exist on that data source.
    async fn load(
        &self,
        data_node: &DataNode,
        database_type: DatabaseType,
    ) -> Result<Option<TableMetaData>, SchemaLoadError>;
}
