// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types for the semantic memory store.

use reverie_core::types::{Relation, DEFAULT_IMPORTANCE};
use serde::{Deserialize, Serialize};

/// The atomic retrievable unit: one chunk of one conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier, assigned at creation.
    pub id: String,
    /// Conversation turns this memory was derived from.
    #[serde(default)]
    pub source_message_ids: Vec<String>,
    /// Creation order key in milliseconds, strictly increasing within a collection.
    pub timestamp: i64,
    /// Literal chunk text; this is what gets embedded and returned.
    pub full_text: String,
    #[serde(default)]
    pub summary: String,
    /// Short instruction-free sentences, shared by every chunk of a turn.
    #[serde(default)]
    pub sanitized_facts: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// 1-10 scale.
    #[serde(default = "default_importance")]
    pub importance: u8,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// Chronological chain link (lookup only).
    #[serde(default)]
    pub previous_memory_id: Option<String>,
    #[serde(default)]
    pub next_memory_id: Option<String>,
}

fn default_importance() -> u8 {
    DEFAULT_IMPORTANCE
}

/// A memory as persisted in the metadata keyspace, with its index label.
///
/// `label` is `None` for metadata-only records whose vector is not in the
/// current index (listable, not searchable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    #[serde(flatten)]
    pub memory: Memory,
    #[serde(default)]
    pub label: Option<usize>,
}

impl MemoryRecord {
    pub fn new(memory: Memory, label: Option<usize>) -> Self {
        Self { memory, label }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }
}

/// A retrieval candidate with its L2 distance and composite score.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    /// Squared L2 distance to the query vector.
    pub distance: f32,
    /// Blended relevance/importance/recency score.
    pub score: f64,
}

/// Point-in-time counters for one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Metadata records, searchable or not.
    pub memories: usize,
    /// Records attached to a live index vector.
    pub searchable: usize,
    /// Vectors in the index, including dead ones.
    pub index_len: usize,
    /// Vectors whose memory was deleted.
    pub dead: usize,
    pub capacity: usize,
    pub dimensions: Option<usize>,
}

/// Key of a memory record: `"{collection}:{memory_id}"`.
pub fn record_key(collection: &str, memory_id: &str) -> String {
    format!("{collection}:{memory_id}")
}

/// Key prefix shared by every record of a collection.
pub fn collection_prefix(collection: &str) -> String {
    format!("{collection}:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Memory {
        Memory {
            id: "m-1".into(),
            source_message_ids: vec!["u1".into(), "a1".into()],
            timestamp: 1_700_000_000_000,
            full_text: "User: hello".into(),
            summary: "greeting".into(),
            sanitized_facts: vec![],
            tags: vec!["intro".into()],
            importance: 7,
            mood: None,
            relations: vec![],
            previous_memory_id: None,
            next_memory_id: Some("m-2".into()),
        }
    }

    #[test]
    fn record_json_is_flat_and_keeps_label() {
        let record = MemoryRecord::new(sample(), Some(3));
        let json = record.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["id"], "m-1");
        assert_eq!(value["label"], 3);
        assert_eq!(MemoryRecord::from_json(&json).unwrap(), record);
    }

    #[test]
    fn minimal_record_gets_defaults() {
        let json = r#"{"id":"x","timestamp":5,"full_text":"t"}"#;
        let record = MemoryRecord::from_json(json).unwrap();
        assert_eq!(record.memory.importance, DEFAULT_IMPORTANCE);
        assert!(record.memory.source_message_ids.is_empty());
        assert!(record.label.is_none());
    }

    #[test]
    fn keys_are_collection_scoped() {
        assert_eq!(record_key("chat-7", "m-1"), "chat-7:m-1");
        assert!(record_key("chat-7", "m-1").starts_with(&collection_prefix("chat-7")));
    }
}
