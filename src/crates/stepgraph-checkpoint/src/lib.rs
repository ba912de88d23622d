//! Checkpoint tree persistence for the stepgraph execution engine
//!
//! This crate defines the checkpoint data model ([`Checkpoint`], an
//! immutable full-state snapshot with a parent pointer), the storage
//! abstraction ([`CheckpointSaver`]), a pluggable serialization protocol,
//! and the reference in-memory backend ([`InMemoryCheckpointSaver`]).
//!
//! A thread's checkpoints form an append-only tree: normal execution
//! extends the head, time-travel forks and state edits attach new
//! branches under historical checkpoints, and nothing is ever mutated in
//! place. The engine in `stepgraph-core` is written purely against the
//! [`CheckpointSaver`] trait, so backends are swappable.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod serializer;
pub mod traits;

pub use checkpoint::{Checkpoint, CheckpointId, CheckpointSource, CheckpointSummary};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointSaver;
pub use serializer::{BincodeSerializer, JsonSerializer, SerializerProtocol};
pub use traits::CheckpointSaver;
