//! Error types for algorithm construction and invocation.

/// Errors produced by the algorithm registry and the built-in algorithms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlgorithmError {
    /// No factory registered under this type for the requested capability.
    #[error("no {capability} algorithm registered for type '{type_name}'")]
    UnknownType {
        /// `"sharding"` or `"key generate"`.
        capability: &'static str,
        /// The requested type string.
        type_name: String,
    },

    /// A required property is missing.
    #[error("{type_name}: missing required property '{property}'")]
    MissingProperty {
        /// Algorithm type.
        type_name: &'static str,
        /// Property name.
        property: &'static str,
    },

    /// A property is present but unusable.
    #[error("{type_name}: invalid property '{property}' = '{value}': {reason}")]
    InvalidProperty {
        /// Algorithm type.
        type_name: &'static str,
        /// Property name.
        property: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The sharding value cannot be handled by this algorithm.
    #[error("{type_name}: unsupported sharding value '{value}'")]
    UnsupportedValue {
        /// Algorithm type.
        type_name: &'static str,
        /// Rendered value.
        value: String,
    },

    /// The computed target is not among the available targets.
    #[error("{type_name}: no available target '{target}' for sharding value '{value}'")]
    NoTarget {
        /// Algorithm type.
        type_name: &'static str,
        /// Computed target.
        target: String,
        /// Rendered value.
        value: String,
    },

    /// The system clock went backwards by more than the tolerated amount.
    #[error("clock moved backwards by {millis} ms, refusing to generate key")]
    ClockMovedBackwards {
        /// How far the clock moved back.
        millis: u64,
    },
}
