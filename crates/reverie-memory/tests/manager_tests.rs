// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index manager behavior against the in-memory storage backend.

use std::sync::Arc;

use reverie_core::StorageAdapter;
use reverie_memory::{HnswConfig, IndexManager, IndexRegistry, Memory};
use reverie_test_utils::InMemoryStorage;

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

fn manager(storage: &Arc<InMemoryStorage>) -> IndexManager {
    let storage: Arc<dyn StorageAdapter> = storage.clone();
    IndexManager::new(storage, Arc::new(IndexRegistry::new()), HnswConfig::default())
}

#[tokio::test]
async fn concurrent_persists_run_one_at_a_time() {
    let storage = Arc::new(InMemoryStorage::new());
    let manager = manager(&storage);
    let handle = manager.load_index("c", Some(2)).await.unwrap();
    handle
        .state()
        .await
        .insert(&[1.0, 0.0], memory("m0", 1))
        .unwrap();

    let (first, second) = tokio::join!(manager.persist(&handle), manager.persist(&handle));
    first.unwrap();
    second.unwrap();

    assert_eq!(storage.blob_writes(), 2);
    assert_eq!(storage.max_concurrent_blob_writes(), 1);
}

#[tokio::test]
async fn persisted_collection_reloads_after_eviction() {
    let storage = Arc::new(InMemoryStorage::new());
    let manager = manager(&storage);
    let handle = manager.load_index("c", Some(2)).await.unwrap();
    handle
        .state()
        .await
        .insert(&[0.0, 1.0], memory("m0", 1))
        .unwrap();
    manager.persist(&handle).await.unwrap();

    manager.invalidate("c").await;
    let reloaded = manager.load_index("c", None).await.unwrap();
    let state = reloaded.state().await;
    assert_eq!(state.dimensions(), Some(2));
    assert_eq!(state.search(&[0.0, 1.0], 1)[0].0.id, "m0");
}

#[tokio::test]
async fn delete_collection_leaves_prefix_sibling_records() {
    let storage = Arc::new(InMemoryStorage::new());
    let manager = manager(&storage);
    for (name, id) in [("a", "m1"), ("a:b", "m2")] {
        let handle = manager.load_index(name, Some(2)).await.unwrap();
        handle
            .state()
            .await
            .insert(&[1.0, 1.0], memory(id, 1))
            .unwrap();
        manager.persist(&handle).await.unwrap();
    }

    assert_eq!(manager.delete_collection("a").await.unwrap(), 1);
    assert_eq!(storage.record_keys().await, vec!["a:b:m2".to_string()]);
}
