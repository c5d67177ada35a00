//! Graph execution engine — the validated node/edge model, the greedy path
//! resolver, and the streaming node executor.
//!
//! A caller submits nodes and edges; `prepare` validates the shape and
//! resolves one linear path from the query node to the output node;
//! `NodeExecutor::execute` walks that path, drives the generation backend,
//! and yields [`flowstack_core::types::ExecutionEvent`]s as they happen.

pub mod executor;
pub mod model;
pub mod path;

pub use executor::{prepare, ExecutionPlan, NodeExecutor};
pub use model::{Edge, Graph, Node, NodeKind};
pub use path::{resolve, MAX_PATH_LEN};
