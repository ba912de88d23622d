//! The compiled graph handle

use crate::error::{GraphError, Result};
use crate::graph::{Graph, NodeId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use stepgraph_checkpoint::{CheckpointSaver, InMemoryCheckpointSaver};

/// Per-run execution limits
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum super-steps per run; guards non-terminating cycles
    pub max_steps: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { max_steps: 25 }
    }
}

/// Executable graph, frozen at compile time and shared across threads
///
/// Cloning is cheap (the topology is behind an `Arc`) and clones share
/// the checkpoint store and the per-thread run registry, so concurrent
/// callers holding clones still get single-writer semantics per thread.
#[derive(Clone)]
pub struct CompiledGraph {
    pub(crate) graph: Arc<Graph>,
    pub(crate) entry: NodeId,
    pub(crate) saver: Arc<dyn CheckpointSaver>,
    pub(crate) running: Arc<Mutex<HashSet<String>>>,
    pub(crate) config: RunConfig,
}

impl CompiledGraph {
    pub(crate) fn new(graph: Graph, config: RunConfig) -> Self {
        // validate() ran before construction, so an entry is designated
        let entry = graph.entry.clone().unwrap_or_default();
        Self {
            graph: Arc::new(graph),
            entry,
            saver: Arc::new(InMemoryCheckpointSaver::new()),
            running: Arc::new(Mutex::new(HashSet::new())),
            config,
        }
    }

    /// Swap the checkpoint backend (defaults to the in-memory store)
    pub fn with_checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.saver = saver;
        self
    }

    /// Read-only access to the frozen topology
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The checkpoint store this graph writes to
    pub fn checkpointer(&self) -> Arc<dyn CheckpointSaver> {
        Arc::clone(&self.saver)
    }

    /// Claim the thread's execution lock, non-blocking.
    ///
    /// A second claim while a run is in flight is rejected immediately
    /// rather than queued, preserving a single linear writer per thread.
    pub(crate) fn acquire_run_lock(&self, thread_id: &str) -> Result<RunGuard> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(thread_id.to_string()) {
            return Err(GraphError::ConcurrentExecution(thread_id.to_string()));
        }
        Ok(RunGuard {
            running: Arc::clone(&self.running),
            thread_id: thread_id.to_string(),
        })
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("entry", &self.entry)
            .field("nodes", &self.graph.nodes.len())
            .field("interrupt_before", &self.graph.interrupt_before)
            .field("max_steps", &self.config.max_steps)
            .finish()
    }
}

/// RAII guard releasing the thread's run lock on drop
pub(crate) struct RunGuard {
    running: Arc<Mutex<HashSet<String>>>,
    thread_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled() -> CompiledGraph {
        use crate::builder::StateGraph;
        use crate::graph::END;
        use serde_json::json;

        let mut builder = StateGraph::new();
        builder
            .add_node("a", |_| async move { Ok(json!({})) })
            .add_edge("a", END)
            .set_entry("a");
        builder.compile().unwrap()
    }

    #[test]
    fn test_run_lock_is_exclusive_per_thread() {
        let graph = compiled();

        let guard = graph.acquire_run_lock("t1").unwrap();
        assert!(matches!(
            graph.acquire_run_lock("t1"),
            Err(GraphError::ConcurrentExecution(_))
        ));
        // Other threads are unaffected
        let _other = graph.acquire_run_lock("t2").unwrap();

        drop(guard);
        assert!(graph.acquire_run_lock("t1").is_ok());
    }

    #[test]
    fn test_clones_share_run_registry() {
        let graph = compiled();
        let clone = graph.clone();

        let _guard = graph.acquire_run_lock("t1").unwrap();
        assert!(matches!(
            clone.acquire_run_lock("t1"),
            Err(GraphError::ConcurrentExecution(_))
        ));
    }
}
