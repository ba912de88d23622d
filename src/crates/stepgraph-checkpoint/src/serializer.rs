//! Pluggable serialization for checkpoint persistence
//!
//! Backends decide how checkpoint records hit the wire. [`JsonSerializer`]
//! is the default (human-inspectable, cross-language); [`BincodeSerializer`]
//! trades that for compactness.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Protocol for serializing checkpoint data to and from bytes
pub trait SerializerProtocol: Send + Sync {
    /// Serialize a value to bytes
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from bytes
    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T>;
}

/// JSON serialization (default)
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Binary serialization via bincode
///
/// Bincode is not self-describing, so it cannot decode dynamic
/// `serde_json::Value` snapshots; use it for payloads with a static
/// shape (summaries, custom backend records) and [`JsonSerializer`]
/// for full checkpoints.
#[derive(Debug, Clone, Default)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for BincodeSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{Checkpoint, CheckpointSource};
    use serde_json::json;

    #[test]
    fn test_json_round_trip() {
        let serializer = JsonSerializer::new();
        let checkpoint = Checkpoint::new(
            "thread-1",
            None,
            json!({"messages": ["hello"], "flag": true}),
            vec!["tools".to_string()],
            CheckpointSource::Step,
        );

        let bytes = serializer.dumps(&checkpoint).unwrap();
        let restored: Checkpoint = serializer.loads(&bytes).unwrap();
        assert_eq!(checkpoint, restored);
    }

    #[test]
    fn test_bincode_round_trip() {
        use crate::checkpoint::CheckpointSummary;

        let serializer = BincodeSerializer::new();
        let checkpoint = Checkpoint::new(
            "thread-1",
            Some("parent".to_string()),
            json!({"count": 3}),
            vec![],
            CheckpointSource::Update,
        );
        let summary = CheckpointSummary::from(&checkpoint);

        let bytes = serializer.dumps(&summary).unwrap();
        let restored: CheckpointSummary = serializer.loads(&bytes).unwrap();
        assert_eq!(summary, restored);
    }
}
