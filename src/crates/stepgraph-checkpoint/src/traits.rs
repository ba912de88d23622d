//! Extensible checkpoint storage trait for custom backend implementations
//!
//! [`CheckpointSaver`] is the storage abstraction the execution engine is
//! written against. Implementations can back the checkpoint tree with any
//! store (in-memory, SQLite, Postgres, object storage) as long as they
//! keep the contract below:
//!
//! - **Append-only**: a saved checkpoint is never overwritten or deleted
//!   by the engine; ids are never reused.
//! - **Atomic saves**: a reader never observes a half-written checkpoint.
//! - **Thread isolation**: checkpoints are namespaced by `thread_id`, and
//!   `load` must refuse to return a checkpoint under another thread's id.
//! - **Head tracking**: each thread has a mutable head pointer advanced by
//!   every `save`; `head` returns the checkpoint it points at.
//! - **O(1) parent lookup**: `load` by id must not scan history, so
//!   callers can walk the tree upward cheaply.
//!
//! Implementations must be `Send + Sync`; different threads' histories may
//! be read and written concurrently. Serializing writers *within* one
//! thread is the engine's job, not the store's.

use crate::checkpoint::{Checkpoint, CheckpointId};
use crate::error::Result;
use async_trait::async_trait;

/// Storage backend for a per-thread tree of immutable checkpoints
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Persist a checkpoint and advance the owning thread's head to it.
    ///
    /// Returns the stored checkpoint id. Fails with
    /// [`CheckpointError::Storage`](crate::CheckpointError::Storage) if the
    /// id already exists (ids are never reused) or on backend failure.
    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointId>;

    /// Load a checkpoint by id.
    ///
    /// Fails with [`CheckpointError::NotFound`](crate::CheckpointError::NotFound)
    /// if the id is absent or belongs to a different thread.
    async fn load(&self, thread_id: &str, checkpoint_id: &str) -> Result<Checkpoint>;

    /// Load the thread's current head checkpoint.
    ///
    /// Fails with [`CheckpointError::EmptyThread`](crate::CheckpointError::EmptyThread)
    /// if the thread has never executed.
    async fn head(&self, thread_id: &str) -> Result<Checkpoint>;

    /// All checkpoints of the thread in creation order, branches included.
    ///
    /// Returns an empty vector for an unknown thread; inspection of a
    /// thread that never ran is not an error.
    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>>;
}
