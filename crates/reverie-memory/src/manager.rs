// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-collection index state and its load / persist / delete lifecycle.
//!
//! A collection owns one HNSW index plus the metadata map. Every record with
//! a label addresses a live vector, and every live vector is addressed by
//! exactly one record.

use std::collections::HashMap;
use std::sync::Arc;

use reverie_core::{ReverieError, StorageAdapter};
use tracing::{debug, info, warn};

use crate::index::{HnswConfig, HnswIndex, IndexError};
use crate::registry::{CollectionHandle, IndexRegistry};
use crate::types::{collection_prefix, record_key, CollectionStats, Memory, MemoryRecord};

/// Everything `persist` writes, captured under the state lock.
#[derive(Debug)]
pub struct Snapshot {
    pub blob: Option<Vec<u8>>,
    pub records: Vec<(String, String)>,
    pub dimensions: Option<usize>,
}

/// In-memory state of one collection.
#[derive(Debug)]
pub struct CollectionIndex {
    name: String,
    config: HnswConfig,
    dimensions: Option<usize>,
    index: Option<HnswIndex>,
    records: HashMap<String, MemoryRecord>,
    label_to_id: HashMap<usize, String>,
}

impl CollectionIndex {
    /// A collection with no memories. The index is created once dimensions are known.
    pub fn empty(name: &str, dimensions: Option<usize>, config: HnswConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            dimensions,
            index: dimensions.map(|d| HnswIndex::new(d, config)),
            records: HashMap::new(),
            label_to_id: HashMap::new(),
        }
    }

    /// Rebuild state from persisted parts.
    ///
    /// A blob that fails to decode, or whose dimension disagrees with
    /// `dimensions`, is discarded for a fresh index. Records are attached to
    /// their labels in `(timestamp, id)` order; records whose label has no
    /// live vector become metadata-only, and vectors no record claims are
    /// marked dead.
    pub fn restore(
        name: &str,
        dimensions: Option<usize>,
        blob: Option<&[u8]>,
        mut records: Vec<MemoryRecord>,
        config: HnswConfig,
    ) -> Self {
        let mut dimensions = dimensions;
        let decoded = blob.and_then(|bytes| match HnswIndex::from_bytes(bytes) {
            Ok(index) if dimensions.is_none_or(|d| d == index.dimensions()) => Some(index),
            Ok(index) => {
                warn!(
                    collection = %name,
                    stored = ?dimensions,
                    index = index.dimensions(),
                    "persisted index dimension disagrees with dimension record, starting fresh"
                );
                None
            }
            Err(e) => {
                warn!(collection = %name, error = %e, "corrupt persisted index, starting fresh");
                None
            }
        });
        if dimensions.is_none() {
            dimensions = decoded.as_ref().map(HnswIndex::dimensions);
        }
        let mut index = decoded.or_else(|| dimensions.map(|d| HnswIndex::new(d, config)));

        records.sort_by(|a, b| {
            a.memory
                .timestamp
                .cmp(&b.memory.timestamp)
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });

        let mut state = Self::empty(name, dimensions, config);
        let mut detached = 0usize;
        for mut record in records {
            let attached = match (record.label, index.as_ref()) {
                (Some(label), Some(idx)) => {
                    label < idx.len()
                        && !idx.is_deleted(label)
                        && !state.label_to_id.contains_key(&label)
                }
                _ => false,
            };
            if attached {
                if let Some(label) = record.label {
                    state.label_to_id.insert(label, record.memory.id.clone());
                }
            } else {
                if record.label.is_some() {
                    detached += 1;
                }
                record.label = None;
            }
            state.records.insert(record.memory.id.clone(), record);
        }

        if let Some(idx) = index.as_mut() {
            for label in 0..idx.len() {
                if !state.label_to_id.contains_key(&label) {
                    idx.mark_deleted(label);
                }
            }
        }
        if detached > 0 {
            warn!(
                collection = %name,
                detached,
                "memories without a live vector are no longer searchable"
            );
        }
        state.index = index;
        state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Number of metadata records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Vectors in the index, dead ones included.
    pub fn index_len(&self) -> usize {
        self.index.as_ref().map_or(0, HnswIndex::len)
    }

    pub fn get(&self, id: &str) -> Option<&MemoryRecord> {
        self.records.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut MemoryRecord> {
        self.records.get_mut(id)
    }

    /// All memories in chronological order.
    pub fn memories(&self) -> Vec<Memory> {
        let mut out: Vec<Memory> = self.records.values().map(|r| r.memory.clone()).collect();
        out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// The most recent memory, which new memories chain onto.
    pub fn latest(&self) -> Option<&Memory> {
        self.records
            .values()
            .map(|r| &r.memory)
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
    }

    /// Reject vectors whose dimension differs from the collection's.
    pub fn check_dimensions(&self, actual: usize) -> Result<(), ReverieError> {
        match self.dimensions {
            Some(expected) if expected != actual => Err(ReverieError::DimensionMismatch {
                collection: self.name.clone(),
                expected,
                actual,
            }),
            _ => Ok(()),
        }
    }

    /// Insert a vector and its memory at the next label.
    ///
    /// The first insert into a dimensionless collection fixes its dimension.
    pub fn insert(&mut self, vector: &[f32], memory: Memory) -> Result<usize, ReverieError> {
        self.check_dimensions(vector.len())?;
        if vector.is_empty() {
            return Err(ReverieError::Contract("embedding vector is empty".into()));
        }
        let config = self.config;
        let index = self
            .index
            .get_or_insert_with(|| HnswIndex::new(vector.len(), config));
        let label = index.insert(vector).map_err(|e| match e {
            IndexError::DimensionMismatch { expected, actual } => ReverieError::DimensionMismatch {
                collection: self.name.clone(),
                expected,
                actual,
            },
            other => ReverieError::Internal(other.to_string()),
        })?;
        self.dimensions = Some(vector.len());
        self.label_to_id.insert(label, memory.id.clone());
        self.records
            .insert(memory.id.clone(), MemoryRecord::new(memory, Some(label)));
        Ok(label)
    }

    /// Nearest live memories with their squared L2 distance.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(Memory, f32)> {
        let Some(index) = self.index.as_ref() else {
            return Vec::new();
        };
        index
            .search(query, k)
            .into_iter()
            .filter_map(|(label, distance)| {
                let id = self.label_to_id.get(&label)?;
                let record = self.records.get(id)?;
                Some((record.memory.clone(), distance))
            })
            .collect()
    }

    /// Remove a memory's metadata; its vector stays in the index as a dead entry.
    pub fn remove(&mut self, id: &str) -> Option<MemoryRecord> {
        let record = self.records.remove(id)?;
        if let Some(label) = record.label {
            self.label_to_id.remove(&label);
            if let Some(index) = self.index.as_mut() {
                index.mark_deleted(label);
            }
        }
        Some(record)
    }

    pub fn stats(&self) -> CollectionStats {
        let (index_len, dead, capacity) = self
            .index
            .as_ref()
            .map_or((0, 0, 0), |i| (i.len(), i.dead_count(), i.capacity()));
        CollectionStats {
            memories: self.records.len(),
            searchable: self.label_to_id.len(),
            index_len,
            dead,
            capacity,
            dimensions: self.dimensions,
        }
    }

    pub fn snapshot(&self) -> Result<Snapshot, ReverieError> {
        let blob = self
            .index
            .as_ref()
            .map(HnswIndex::to_bytes)
            .transpose()
            .map_err(|e| ReverieError::Internal(e.to_string()))?;
        let records = self
            .records
            .values()
            .map(|r| {
                r.to_json()
                    .map(|json| (record_key(&self.name, &r.memory.id), json))
                    .map_err(|e| ReverieError::Internal(format!("failed to encode memory: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Snapshot {
            blob,
            records,
            dimensions: self.dimensions,
        })
    }
}

/// Loads, caches, persists and deletes collections.
pub struct IndexManager {
    storage: Arc<dyn StorageAdapter>,
    registry: Arc<IndexRegistry>,
    config: HnswConfig,
}

impl IndexManager {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        registry: Arc<IndexRegistry>,
        config: HnswConfig,
    ) -> Self {
        Self {
            storage,
            registry,
            config,
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    /// Cached handle for `collection`, loading it from storage on first use.
    ///
    /// `dimensions` only matters for a collection with no dimension record
    /// yet: the persisted record always wins.
    pub async fn load_index(
        &self,
        collection: &str,
        dimensions: Option<usize>,
    ) -> Result<Arc<CollectionHandle>, ReverieError> {
        if let Some(handle) = self.registry.get(collection).await {
            return Ok(handle);
        }

        let prefix = collection_prefix(collection);
        let mut records = Vec::new();
        for (key, value) in self.storage.list_records(&prefix).await? {
            if !owns_key(&prefix, &key) {
                continue;
            }
            match MemoryRecord::from_json(&value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(collection, key = %key, error = %e, "skipping unreadable memory record")
                }
            }
        }

        let stored_dims = self.storage.get_dimensions(collection).await?;
        let blob = self.storage.get_index_blob(collection).await?;
        let state = CollectionIndex::restore(
            collection,
            stored_dims.or(dimensions),
            blob.as_deref(),
            records,
            self.config,
        );
        debug!(
            collection,
            memories = state.len(),
            vectors = state.index_len(),
            dims = ?state.dimensions(),
            "collection loaded"
        );
        Ok(self.registry.insert_if_absent(CollectionHandle::new(state)).await)
    }

    /// Write the index blob, the full metadata snapshot and the dimension record.
    ///
    /// Concurrent calls for one collection run one at a time.
    pub async fn persist(&self, handle: &CollectionHandle) -> Result<(), ReverieError> {
        let _sync = handle.sync_guard().await;
        let snapshot = handle.state().await.snapshot()?;

        let count = snapshot.records.len();
        if let Some(blob) = snapshot.blob {
            self.storage.put_index_blob(handle.name(), blob).await?;
        }
        self.storage.put_records(snapshot.records).await?;
        if let Some(dims) = snapshot.dimensions {
            self.storage.put_dimensions(handle.name(), dims).await?;
        }
        debug!(collection = %handle.name(), records = count, "collection persisted");
        Ok(())
    }

    /// Drop the cached handle; the next access reloads from storage.
    pub async fn invalidate(&self, collection: &str) {
        if self.registry.evict(collection).await {
            debug!(collection, "collection cache invalidated");
        }
    }

    /// Remove the index blob, every metadata record and the dimension record.
    pub async fn delete_collection(&self, collection: &str) -> Result<usize, ReverieError> {
        let cached = self.registry.get(collection).await;
        let _sync = match cached.as_ref() {
            Some(handle) => Some(handle.sync_guard().await),
            None => None,
        };
        self.registry.evict(collection).await;

        self.storage.delete_index_blob(collection).await?;
        let prefix = collection_prefix(collection);
        let keys: Vec<String> = self
            .storage
            .list_records(&prefix)
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| owns_key(&prefix, key))
            .collect();
        let removed = keys.len();
        self.storage.delete_records(keys).await?;
        self.storage.delete_dimensions(collection).await?;
        info!(collection, removed, "collection deleted");
        Ok(removed)
    }
}

/// Whether `key` under `prefix` is a record of that collection itself.
///
/// "a:" also matches keys of a collection named "a:b".
fn owns_key(prefix: &str, key: &str) -> bool {
    key.strip_prefix(prefix).is_some_and(|id| !id.contains(':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(id: &str, timestamp: i64) -> Memory {
        Memory {
            id: id.into(),
            source_message_ids: vec![],
            timestamp,
            full_text: format!("text {id}"),
            summary: String::new(),
            sanitized_facts: vec![],
            tags: vec![],
            importance: 5,
            mood: None,
            relations: vec![],
            previous_memory_id: None,
            next_memory_id: None,
        }
    }

    fn filled(n: usize) -> CollectionIndex {
        let mut state = CollectionIndex::empty("c", None, HnswConfig::default());
        for i in 0..n {
            state
                .insert(&[i as f32, 0.0], memory(&format!("m{i}"), i as i64))
                .unwrap();
        }
        state
    }

    #[test]
    fn first_insert_fixes_dimension() {
        let mut state = filled(1);
        assert_eq!(state.dimensions(), Some(2));
        let err = state.insert(&[1.0, 2.0, 3.0], memory("x", 9)).unwrap_err();
        assert!(matches!(err, ReverieError::DimensionMismatch { expected: 2, actual: 3, .. }));
        assert_eq!(state.len(), 1);
        assert_eq!(state.index_len(), 1);
    }

    #[test]
    fn remove_leaves_dead_vector() {
        let mut state = filled(3);
        assert!(state.remove("m1").is_some());
        let stats = state.stats();
        assert_eq!(stats.memories, 2);
        assert_eq!(stats.searchable, 2);
        assert_eq!(stats.index_len, 3);
        assert_eq!(stats.dead, 1);
        let found: Vec<String> = state
            .search(&[1.0, 0.0], 3)
            .into_iter()
            .map(|(m, _)| m.id)
            .collect();
        assert!(!found.contains(&"m1".to_string()));
    }

    #[test]
    fn restore_reattaches_labels_and_kills_orphans() {
        let mut state = filled(4);
        let snapshot = state.snapshot().unwrap();
        state.remove("m2");
        let records: Vec<MemoryRecord> = state.records.values().cloned().collect();

        let restored = CollectionIndex::restore(
            "c",
            Some(2),
            snapshot.blob.as_deref(),
            records,
            HnswConfig::default(),
        );
        let stats = restored.stats();
        assert_eq!(stats.memories, 3);
        assert_eq!(stats.searchable, 3);
        assert_eq!(stats.dead, 1);
        let (top, _) = &restored.search(&[2.0, 0.0], 1)[0];
        assert_ne!(top.id, "m2");
        assert_eq!(restored.get("m3").unwrap().label, Some(3));
    }

    #[test]
    fn restore_with_corrupt_blob_keeps_metadata_only() {
        let state = filled(2);
        let records: Vec<MemoryRecord> = state.records.values().cloned().collect();
        let restored = CollectionIndex::restore(
            "c",
            Some(2),
            Some(b"garbage"),
            records,
            HnswConfig::default(),
        );
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.stats().searchable, 0);
        assert_eq!(restored.index_len(), 0);
        assert_eq!(restored.dimensions(), Some(2));
        assert!(restored.search(&[0.0, 0.0], 5).is_empty());
    }

    #[test]
    fn restore_rejects_blob_with_other_dimension() {
        let state = filled(2);
        let blob = state.snapshot().unwrap().blob;
        let restored =
            CollectionIndex::restore("c", Some(5), blob.as_deref(), vec![], HnswConfig::default());
        assert_eq!(restored.dimensions(), Some(5));
        assert_eq!(restored.index_len(), 0);
    }

    #[test]
    fn latest_is_max_timestamp() {
        let state = filled(3);
        assert_eq!(state.latest().map(|m| m.id.as_str()), Some("m2"));
        let ids: Vec<String> = state.memories().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m0", "m1", "m2"]);
    }
}
