//! Checkpointed step-graph execution engine
//!
//! stepgraph executes a fixed, precompiled directed graph of computation
//! steps over a mutable shared state, with three properties that make it
//! more than a task runner:
//!
//! - **Interrupt/resume**: execution halts immediately before any node in
//!   a compile-time interrupt set and can be resumed later — approving or
//!   rejecting the pending node — from a durable checkpoint.
//! - **Addressable history**: every super-step writes an immutable
//!   checkpoint; execution history can be inspected and replayed.
//! - **Time-travel branching**: a run can re-enter at any historical
//!   checkpoint, producing a sibling branch of the checkpoint tree
//!   instead of overwriting the old line.
//!
//! The engine knows nothing about what a node *means* — only how nodes,
//! edges, interrupts, and checkpoints compose. Node handlers are async
//! closures returning partial state updates; they may perform blocking
//! I/O and must tolerate at-least-once re-invocation (a crash between a
//! handler's side effect and its checkpoint write re-runs the handler).
//!
//! Build a graph with [`StateGraph`], drive it with
//! [`CompiledGraph::start`], [`CompiledGraph::resume`],
//! [`CompiledGraph::fork_from`], and [`CompiledGraph::update_state`].
//! Persistence goes through the `stepgraph-checkpoint` crate's
//! [`CheckpointSaver`] trait; the in-memory backend is the default.

pub mod builder;
pub mod compiled;
pub mod error;
pub mod graph;
pub mod state;

pub use builder::StateGraph;
pub use compiled::{CompiledGraph, ResumeDecision, RunConfig, StepResult};
pub use error::{GraphError, Result};
pub use graph::{Edge, HandlerError, NodeHandler, NodeId, NodeSpec, RouteTarget, Router, END};
pub use state::{ReducerPolicy, StateError, StateSchema};
pub use stepgraph_checkpoint::{
    Checkpoint, CheckpointError, CheckpointId, CheckpointSaver, CheckpointSource,
    CheckpointSummary, InMemoryCheckpointSaver,
};
