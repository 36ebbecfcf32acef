//! Type-string to factory lookup for algorithms.

use std::collections::HashMap;
use std::sync::Arc;

use shardline_types::{AlgorithmConfig, Props};
use tracing::debug;

use crate::{
    AlgorithmError, HashModAlgorithm, InlineAlgorithm, KeyGenerateAlgorithm, ModAlgorithm,
    ShardingAlgorithm, SnowflakeKeyGenerator, UuidKeyGenerator, VolumeRangeAlgorithm,
};

type Result<T> = std::result::Result<T, AlgorithmError>;

/// Builds a sharding algorithm from its properties.
pub type ShardingFactory = fn(&Props) -> Result<Arc<dyn ShardingAlgorithm>>;

/// Builds a key generator from its properties.
pub type KeyGenerateFactory = fn(&Props) -> Result<Arc<dyn KeyGenerateAlgorithm>>;

/// Registry of algorithm factories.
///
/// Type strings are matched case-insensitively. [`Default`] registers every
/// built-in algorithm.
#[derive(Debug, Clone)]
pub struct AlgorithmRegistry {
    sharding: HashMap<String, ShardingFactory>,
    key_generators: HashMap<String, KeyGenerateFactory>,
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_sharding(ModAlgorithm::TYPE, |props| {
            Ok(Arc::new(ModAlgorithm::from_props(props)?))
        });
        registry.register_sharding(HashModAlgorithm::TYPE, |props| {
            Ok(Arc::new(HashModAlgorithm::from_props(props)?))
        });
        registry.register_sharding(VolumeRangeAlgorithm::TYPE, |props| {
            Ok(Arc::new(VolumeRangeAlgorithm::from_props(props)?))
        });
        registry.register_sharding(InlineAlgorithm::TYPE, |props| {
            Ok(Arc::new(InlineAlgorithm::from_props(props)?))
        });
        registry.register_key_generator(SnowflakeKeyGenerator::TYPE, |props| {
            Ok(Arc::new(SnowflakeKeyGenerator::from_props(props)?))
        });
        registry.register_key_generator(UuidKeyGenerator::TYPE, |props| {
            Ok(Arc::new(UuidKeyGenerator::from_props(props)?))
        });
        registry
    }
}

impl AlgorithmRegistry {
    /// Type used when a rule configures no key generator.
    pub const DEFAULT_KEY_GENERATOR: &'static str = SnowflakeKeyGenerator::TYPE;

    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            sharding: HashMap::new(),
            key_generators: HashMap::new(),
        }
    }

    /// Register (or replace) a sharding algorithm type.
    pub fn register_sharding(&mut self, type_name: &str, factory: ShardingFactory) {
        self.sharding.insert(type_name.to_ascii_uppercase(), factory);
    }

    /// Register (or replace) a key generator type.
    pub fn register_key_generator(&mut self, type_name: &str, factory: KeyGenerateFactory) {
        self.key_generators
            .insert(type_name.to_ascii_uppercase(), factory);
    }

    /// Instantiate a configured sharding algorithm.
    pub fn create_sharding(&self, config: &AlgorithmConfig) -> Result<Arc<dyn ShardingAlgorithm>> {
        let factory = self
            .sharding
            .get(&config.type_name.to_ascii_uppercase())
            .ok_or_else(|| AlgorithmError::UnknownType {
                capability: "sharding",
                type_name: config.type_name.clone(),
            })?;
        let algorithm = factory(&config.props)?;
        debug!(type_name = %config.type_name, "created sharding algorithm");
        Ok(algorithm)
    }

    /// Instantiate a configured key generator.
    pub fn create_key_generator(
        &self,
        config: &AlgorithmConfig,
    ) -> Result<Arc<dyn KeyGenerateAlgorithm>> {
        let factory = self
            .key_generators
            .get(&config.type_name.to_ascii_uppercase())
            .ok_or_else(|| AlgorithmError::UnknownType {
                capability: "key generate",
                type_name: config.type_name.clone(),
            })?;
        let algorithm = factory(&config.props)?;
        debug!(type_name = %config.type_name, "created key generator");
        Ok(algorithm)
    }

    /// The key generator used when none is configured.
    pub fn default_key_generator(&self) -> Result<Arc<dyn KeyGenerateAlgorithm>> {
        self.create_key_generator(&AlgorithmConfig::new(
            Self::DEFAULT_KEY_GENERATOR,
            Props::new(),
        ))
    }

    /// Registered sharding types, sorted.
    pub fn sharding_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.sharding.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Registered key generator types, sorted.
    pub fn key_generator_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.key_generators.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
