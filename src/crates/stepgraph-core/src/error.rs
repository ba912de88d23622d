//! Error types for graph compilation and execution
//!
//! Every failure mode maps to a distinct variant the caller can branch
//! on. Handler failures are deliberately *not* errors: a node that raises
//! produces a [`StepResult::Failed`](crate::compiled::StepResult::Failed)
//! result referencing the last durable checkpoint, because no state was
//! committed and the caller can retry from exactly that point.

use crate::state::StateError;
use thiserror::Error;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur when compiling or driving a graph
#[derive(Error, Debug)]
pub enum GraphError {
    /// Compile-time topology validation failure; the graph is unusable
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A conditional router returned a node outside its declared candidate set
    #[error("Route from node '{node}' resolved to undeclared target '{target}'")]
    Route { node: String, target: String },

    /// The thread already has a head checkpoint; use `resume` or `fork_from`
    #[error("Thread '{0}' has already been started")]
    AlreadyStarted(String),

    /// The thread is not halted at an interrupt boundary
    #[error("Thread '{0}' is not interrupted")]
    NotInterrupted(String),

    /// Another run already holds the thread's execution lock
    #[error("Thread '{0}' is already executing; retry later")]
    ConcurrentExecution(String),

    /// State schema violation (unknown field, reducer mismatch)
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Checkpoint store failure (includes not-found and empty-thread)
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] stepgraph_checkpoint::CheckpointError),
}

impl GraphError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a routing error
    pub fn route(node: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Route {
            node: node.into(),
            target: target.into(),
        }
    }
}
