//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// The referenced checkpoint does not exist, or belongs to another thread
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    /// The thread has never written a checkpoint
    #[error("Thread has no checkpoints: {0}")]
    EmptyThread(String),

    /// Backend storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary serialization error
    #[error("Binary serialization error: {0}")]
    BinarySerialization(#[from] bincode::Error),

    /// Malformed checkpoint or request
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),
}
