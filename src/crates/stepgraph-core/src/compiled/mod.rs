//! Compiled graph: the frozen, executable form
//!
//! Split in two: `graph` holds the [`CompiledGraph`] handle, checkpointer
//! attachment, and the per-thread run lock; `execution` holds the
//! super-step loop and the public operations (`start`, `resume`,
//! `fork_from`, `update_state`, state reads).

mod execution;
mod graph;

pub use execution::{ResumeDecision, StepResult};
pub use graph::{CompiledGraph, RunConfig};
