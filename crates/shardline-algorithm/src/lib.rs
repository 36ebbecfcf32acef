//! Pluggable algorithms for shardline.
//!
//! Algorithms are referenced from configuration by name and resolved through
//! the [`AlgorithmRegistry`], which maps a type string (`"MOD"`,
//! `"SNOWFLAKE"`, ...) to a factory. Three capabilities exist:
//!
//! - [`ShardingAlgorithm`] picks a target for a sharding value.
//! - [`AutoTableAlgorithm`] is a sharding algorithm that also knows how many
//!   tables it shards over, which lets a table's nodes be generated.
//! - [`KeyGenerateAlgorithm`] produces keys for generated columns.
//!
//! Built-in sharding types: `MOD`, `HASH_MOD`, `VOLUME_RANGE` (all
//! auto-table capable) and `INLINE`. Built-in key generators: `SNOWFLAKE`
//! and `UUID`.

mod error;
mod keygen;
mod registry;
mod sharding;
mod traits;

pub use error::AlgorithmError;
pub use keygen::{SnowflakeKeyGenerator, UuidKeyGenerator};
pub use registry::{AlgorithmRegistry, KeyGenerateFactory, ShardingFactory};
pub use sharding::{HashModAlgorithm, InlineAlgorithm, ModAlgorithm, VolumeRangeAlgorithm};
pub use traits::{
    AutoTableAlgorithm, GeneratedKey, KeyGenerateAlgorithm, ShardingAlgorithm, ShardingValue,
};
