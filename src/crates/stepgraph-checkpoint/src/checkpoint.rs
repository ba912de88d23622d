//! Core checkpoint data structures for state persistence and time-travel
//!
//! A [`Checkpoint`] is an immutable, addressable snapshot of a thread's
//! materialized state plus its pending-execution position. The set of
//! checkpoints written for one thread forms a tree rooted at the thread's
//! first checkpoint: normal execution extends the current head, while
//! forks and state edits attach siblings under a historical parent.
//!
//! Checkpoints carry the **full** state snapshot, not a delta. Loading a
//! checkpoint never requires replaying its ancestors; the `parent_id`
//! pointer exists only so callers can reconstruct the tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Checkpoint ID type
pub type CheckpointId = String;

/// Origin of a checkpoint write
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Seed checkpoint written by `start` before any node runs
    Input,
    /// Checkpoint written after a super-step of the execution loop
    Step,
    /// Checkpoint written when re-entering execution at a historical parent
    Fork,
    /// Checkpoint written by a manual state edit
    Update,
}

/// Immutable snapshot of thread state at a given point in execution
///
/// Invariants maintained by the engine and the store:
/// - `id` is globally unique and never reused
/// - `parent_id`, when present, references an existing checkpoint of the
///   same thread
/// - `pending_nodes` is empty exactly when the run reached a terminal node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Unique identifier of this checkpoint
    pub id: CheckpointId,

    /// Thread that owns this checkpoint
    pub thread_id: String,

    /// Parent checkpoint in the thread's tree, `None` for the root
    pub parent_id: Option<CheckpointId>,

    /// Fully materialized state snapshot (JSON object keyed by schema field)
    pub state: Value,

    /// Node ids not yet executed, in the order the engine will process them
    pub pending_nodes: Vec<String>,

    /// How this checkpoint came to be written
    pub source: CheckpointSource,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a new checkpoint with a fresh v4 id
    pub fn new(
        thread_id: impl Into<String>,
        parent_id: Option<CheckpointId>,
        state: Value,
        pending_nodes: Vec<String>,
        source: CheckpointSource,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            parent_id,
            state,
            pending_nodes,
            source,
            created_at: Utc::now(),
        }
    }

    /// Whether this checkpoint represents a run that reached a terminal node
    pub fn is_complete(&self) -> bool {
        self.pending_nodes.is_empty()
    }

    /// The node the engine will consider next when resuming, if any
    pub fn next_node(&self) -> Option<&str> {
        self.pending_nodes.first().map(|n| n.as_str())
    }
}

/// Lightweight checkpoint listing entry for history/branch visualization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointSummary {
    pub checkpoint_id: CheckpointId,
    pub parent_checkpoint_id: Option<CheckpointId>,
    pub pending_nodes: Vec<String>,
    pub source: CheckpointSource,
    pub created_at: DateTime<Utc>,
}

impl From<&Checkpoint> for CheckpointSummary {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            checkpoint_id: checkpoint.id.clone(),
            parent_checkpoint_id: checkpoint.parent_id.clone(),
            pending_nodes: checkpoint.pending_nodes.clone(),
            source: checkpoint.source,
            created_at: checkpoint.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_creation() {
        let checkpoint = Checkpoint::new(
            "thread-1",
            None,
            json!({"messages": []}),
            vec!["agent".to_string()],
            CheckpointSource::Input,
        );

        assert_eq!(checkpoint.thread_id, "thread-1");
        assert!(checkpoint.parent_id.is_none());
        assert_eq!(checkpoint.next_node(), Some("agent"));
        assert!(!checkpoint.is_complete());
    }

    #[test]
    fn test_unique_ids() {
        let a = Checkpoint::new("t", None, json!({}), vec![], CheckpointSource::Input);
        let b = Checkpoint::new("t", None, json!({}), vec![], CheckpointSource::Input);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_complete_checkpoint() {
        let checkpoint = Checkpoint::new(
            "thread-1",
            Some("parent".to_string()),
            json!({"x": 1}),
            vec![],
            CheckpointSource::Step,
        );

        assert!(checkpoint.is_complete());
        assert_eq!(checkpoint.next_node(), None);
    }

    #[test]
    fn test_summary_from_checkpoint() {
        let checkpoint = Checkpoint::new(
            "thread-1",
            Some("parent".to_string()),
            json!({"x": 1}),
            vec!["tools".to_string()],
            CheckpointSource::Step,
        );

        let summary = CheckpointSummary::from(&checkpoint);
        assert_eq!(summary.checkpoint_id, checkpoint.id);
        assert_eq!(summary.parent_checkpoint_id, Some("parent".to_string()));
        assert_eq!(summary.pending_nodes, vec!["tools".to_string()]);
    }
}
