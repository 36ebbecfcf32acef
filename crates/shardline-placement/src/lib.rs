//! Topology expansion for shardline.
//!
//! This crate turns compact placement declarations into ordered lists of
//! [`DataNode`](shardline_types::DataNode)s:
//!
//! - [`split_and_evaluate`] expands an inline expression such as
//!   `ds_${0..1}.t_order_${[0, 1]}` into literal strings, keeping the author's
//!   order (leftmost placeholder varies slowest).
//! - [`expand_data_nodes`] additionally parses every literal as a node and
//!   rejects data sources outside the recognized set.
//! - [`round_robin`] lays out `amount` synthesized tables over a list of data
//!   sources for auto-sharded tables.
//!
//! Ordering is part of the contract: node indexes, binding-table lockstep and
//! auto-table placement all depend on it.

mod auto;
mod error;
mod expression;

pub use auto::round_robin;
pub use error::PlacementError;
pub use expression::{expand_data_nodes, split_and_evaluate};
