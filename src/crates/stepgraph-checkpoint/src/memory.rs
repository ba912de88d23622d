//! In-memory checkpoint backend
//!
//! [`InMemoryCheckpointSaver`] is the reference [`CheckpointSaver`]
//! implementation, suitable for tests, examples, and single-process
//! deployments. Each thread owns an arena of checkpoint records keyed by
//! id (O(1) load and parent lookup), an insertion-order index for
//! `history`, and a head pointer advanced by every save.
//!
//! Checkpoints are stored serialized. Handing a caller a `Checkpoint`
//! therefore never aliases stored state: a `load` of the same id returns
//! byte-identical state no matter what the caller or the engine did in
//! between.

use crate::checkpoint::{Checkpoint, CheckpointId};
use crate::error::{CheckpointError, Result};
use crate::serializer::{JsonSerializer, SerializerProtocol};
use crate::traits::CheckpointSaver;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-thread checkpoint tree: serialized records plus ordering and head
#[derive(Debug, Default)]
struct ThreadRecord {
    /// Checkpoint id -> serialized checkpoint
    by_id: HashMap<CheckpointId, Vec<u8>>,
    /// Ids in creation order (append-only)
    order: Vec<CheckpointId>,
    /// Most recently saved checkpoint
    head: Option<CheckpointId>,
}

type Storage = Arc<RwLock<HashMap<String, ThreadRecord>>>;

/// Thread-safe in-memory checkpoint store
#[derive(Debug, Clone)]
pub struct InMemoryCheckpointSaver<S: SerializerProtocol = JsonSerializer> {
    storage: Storage,
    serializer: S,
}

impl InMemoryCheckpointSaver<JsonSerializer> {
    /// Create an empty store with the default JSON serializer
    pub fn new() -> Self {
        Self::with_serializer(JsonSerializer::new())
    }
}

impl Default for InMemoryCheckpointSaver<JsonSerializer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SerializerProtocol> InMemoryCheckpointSaver<S> {
    /// Create an empty store using a custom serializer
    pub fn with_serializer(serializer: S) -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            serializer,
        }
    }

    /// Number of threads with at least one checkpoint
    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of stored checkpoints across all threads
    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|record| record.order.len())
            .sum()
    }

    /// Drop all stored checkpoints
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl<S: SerializerProtocol> CheckpointSaver for InMemoryCheckpointSaver<S> {
    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointId> {
        // Serialize outside the write lock; a failure here leaves the
        // store untouched, so a save is all-or-nothing.
        let bytes = self.serializer.dumps(&checkpoint)?;

        let mut storage = self.storage.write().await;
        let record = storage.entry(checkpoint.thread_id.clone()).or_default();

        if record.by_id.contains_key(&checkpoint.id) {
            return Err(CheckpointError::Storage(format!(
                "checkpoint id already exists: {}",
                checkpoint.id
            )));
        }

        if let Some(parent_id) = &checkpoint.parent_id {
            if !record.by_id.contains_key(parent_id) {
                return Err(CheckpointError::Invalid(format!(
                    "parent checkpoint '{}' does not exist in thread '{}'",
                    parent_id, checkpoint.thread_id
                )));
            }
        }

        record.by_id.insert(checkpoint.id.clone(), bytes);
        record.order.push(checkpoint.id.clone());
        record.head = Some(checkpoint.id.clone());

        Ok(checkpoint.id)
    }

    async fn load(&self, thread_id: &str, checkpoint_id: &str) -> Result<Checkpoint> {
        let storage = self.storage.read().await;

        storage
            .get(thread_id)
            .and_then(|record| record.by_id.get(checkpoint_id))
            .map(|bytes| self.serializer.loads(bytes))
            .transpose()?
            .ok_or_else(|| {
                CheckpointError::NotFound(format!(
                    "checkpoint '{}' in thread '{}'",
                    checkpoint_id, thread_id
                ))
            })
    }

    async fn head(&self, thread_id: &str) -> Result<Checkpoint> {
        let storage = self.storage.read().await;

        let head_id = storage
            .get(thread_id)
            .and_then(|record| record.head.as_ref())
            .ok_or_else(|| CheckpointError::EmptyThread(thread_id.to_string()))?;

        let bytes = storage
            .get(thread_id)
            .and_then(|record| record.by_id.get(head_id))
            .ok_or_else(|| {
                CheckpointError::Storage(format!("dangling head pointer: {}", head_id))
            })?;

        self.serializer.loads(bytes)
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let storage = self.storage.read().await;

        let Some(record) = storage.get(thread_id) else {
            return Ok(Vec::new());
        };

        record
            .order
            .iter()
            .filter_map(|id| record.by_id.get(id))
            .map(|bytes| self.serializer.loads(bytes))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointSource;
    use serde_json::json;

    fn checkpoint(
        thread_id: &str,
        parent_id: Option<&str>,
        state: serde_json::Value,
        pending: &[&str],
    ) -> Checkpoint {
        Checkpoint::new(
            thread_id,
            parent_id.map(String::from),
            state,
            pending.iter().map(|n| n.to_string()).collect(),
            CheckpointSource::Step,
        )
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let saver = InMemoryCheckpointSaver::new();
        let cp = checkpoint("t1", None, json!({"x": 1}), &["node_a"]);
        let id = saver.save(cp.clone()).await.unwrap();

        let loaded = saver.load("t1", &id).await.unwrap();
        assert_eq!(loaded.state, json!({"x": 1}));
        assert_eq!(loaded.pending_nodes, vec!["node_a".to_string()]);
    }

    #[tokio::test]
    async fn test_load_wrong_thread_is_not_found() {
        let saver = InMemoryCheckpointSaver::new();
        let id = saver
            .save(checkpoint("t1", None, json!({}), &[]))
            .await
            .unwrap();

        let err = saver.load("t2", &id).await.unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_head_of_empty_thread() {
        let saver = InMemoryCheckpointSaver::new();
        let err = saver.head("missing").await.unwrap_err();
        assert!(matches!(err, CheckpointError::EmptyThread(_)));
    }

    #[tokio::test]
    async fn test_head_advances_with_saves() {
        let saver = InMemoryCheckpointSaver::new();
        let first = saver
            .save(checkpoint("t1", None, json!({"n": 1}), &["a"]))
            .await
            .unwrap();
        let second = saver
            .save(checkpoint("t1", Some(&first), json!({"n": 2}), &[]))
            .await
            .unwrap();

        let head = saver.head("t1").await.unwrap();
        assert_eq!(head.id, second);
        assert_eq!(head.parent_id, Some(first));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let saver = InMemoryCheckpointSaver::new();
        let cp = checkpoint("t1", None, json!({}), &[]);
        saver.save(cp.clone()).await.unwrap();

        let err = saver.save(cp).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Storage(_)));
    }

    #[tokio::test]
    async fn test_unknown_parent_rejected() {
        let saver = InMemoryCheckpointSaver::new();
        let cp = checkpoint("t1", Some("ghost"), json!({}), &[]);
        let err = saver.save(cp).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_history_in_creation_order_with_branches() {
        let saver = InMemoryCheckpointSaver::new();
        let root = saver
            .save(checkpoint("t1", None, json!({"n": 0}), &["a"]))
            .await
            .unwrap();
        let main = saver
            .save(checkpoint("t1", Some(&root), json!({"n": 1}), &[]))
            .await
            .unwrap();
        // Sibling branch under the root, as a fork would create
        let branch = saver
            .save(checkpoint("t1", Some(&root), json!({"n": 2}), &[]))
            .await
            .unwrap();

        let history = saver.history("t1").await.unwrap();
        let ids: Vec<_> = history.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![root, main, branch]);
    }

    #[tokio::test]
    async fn test_stored_checkpoint_is_immutable() {
        let saver = InMemoryCheckpointSaver::new();
        let id = saver
            .save(checkpoint("t1", None, json!({"x": [1, 2]}), &["a"]))
            .await
            .unwrap();

        let mut loaded = saver.load("t1", &id).await.unwrap();
        loaded.state["x"] = json!("mutated");

        let reloaded = saver.load("t1", &id).await.unwrap();
        assert_eq!(reloaded.state, json!({"x": [1, 2]}));
    }

    #[tokio::test]
    async fn test_counts_and_clear() {
        let saver = InMemoryCheckpointSaver::new();
        saver
            .save(checkpoint("t1", None, json!({}), &[]))
            .await
            .unwrap();
        saver
            .save(checkpoint("t2", None, json!({}), &[]))
            .await
            .unwrap();

        assert_eq!(saver.thread_count().await, 2);
        assert_eq!(saver.checkpoint_count().await, 2);

        saver.clear().await;
        assert_eq!(saver.thread_count().await, 0);
    }
}
