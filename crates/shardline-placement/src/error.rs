//! Error types for topology expansion.

use shardline_types::DataNodeError;

/// Errors produced while expanding a placement declaration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    /// A `${` or `$->{` without its closing brace.
    #[error("unterminated placeholder in expression '{expression}'")]
    UnterminatedPlaceholder {
        /// The offending expression.
        expression: String,
    },

    /// A placeholder with nothing inside.
    #[error("empty placeholder in expression '{expression}'")]
    EmptyPlaceholder {
        /// The offending expression.
        expression: String,
    },

    /// A placeholder body that is not a range, list or literal.
    #[error("invalid placeholder '{placeholder}': {reason}")]
    InvalidPlaceholder {
        /// Placeholder body.
        placeholder: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A range that would expand to too many values.
    #[error("range '{placeholder}' expands to {len} values, limit is {limit}")]
    RangeTooLarge {
        /// Placeholder body.
        placeholder: String,
        /// Requested number of values.
        len: u64,
        /// Maximum allowed.
        limit: u64,
    },

    /// An auto table asks for more tables than one range may produce.
    #[error("auto table '{logic_table}' requests {amount} tables, limit is {limit}")]
    TooManyTables {
        /// Logical table name.
        logic_table: String,
        /// Requested number of tables.
        amount: u64,
        /// Maximum allowed.
        limit: u64,
    },

    /// An expanded literal is not a `data_source.table` pair.
    #[error(transparent)]
    InvalidDataNode(#[from] DataNodeError),

    /// The same node appears twice in one expression.
    #[error("actual data node '{data_node}' is declared more than once")]
    DuplicateDataNode {
        /// The node literal.
        data_node: String,
    },

    /// An expanded node names a data source that is not recognized.
    #[error("cannot find data source in sharding rule, invalid actual data node is: '{data_node}'")]
    UnknownDataSource {
        /// The node literal.
        data_node: String,
    },
}
