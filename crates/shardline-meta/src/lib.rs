//! Logical table metadata for shardline.
//!
//! A [`ShardingMetaDataLoader`] turns the physical schemas of a table's data
//! nodes, fetched through a [`SchemaLoader`], into one logical schema. When
//! `check-table-metadata-enabled` is set it fetches every node and fails
//! unless all of them decorate to the same schema.

mod decorator;
mod error;
mod file;
mod loader;
mod traits;

pub use decorator::decorate;
pub use error::{MetaDataError, SchemaLoadError, Violation};
pub use file::FileSchemaLoader;
pub use loader::ShardingMetaDataLoader;
pub use traits::SchemaLoader;
