// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide registry of loaded collection handles.
//!
//! Owned by the composition root and shared with the memory service. A
//! handle is created on first load and dropped only by [`IndexRegistry::evict`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::manager::CollectionIndex;

/// A loaded collection: its mutable state plus the persist critical section.
#[derive(Debug)]
pub struct CollectionHandle {
    name: String,
    state: Mutex<CollectionIndex>,
    /// Held for the whole serialize-and-write step, so only one sync per
    /// collection is in flight; later callers wait their turn.
    sync_lock: Mutex<()>,
}

impl CollectionHandle {
    pub fn new(state: CollectionIndex) -> Self {
        Self {
            name: state.name().to_string(),
            state: Mutex::new(state),
            sync_lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> MutexGuard<'_, CollectionIndex> {
        self.state.lock().await
    }

    pub(crate) async fn sync_guard(&self) -> MutexGuard<'_, ()> {
        self.sync_lock.lock().await
    }
}

/// Collection name to loaded handle.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    handles: RwLock<HashMap<String, Arc<CollectionHandle>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, collection: &str) -> Option<Arc<CollectionHandle>> {
        self.handles.read().await.get(collection).cloned()
    }

    /// Register `handle` unless another load got there first; returns the winner.
    pub async fn insert_if_absent(&self, handle: CollectionHandle) -> Arc<CollectionHandle> {
        let mut handles = self.handles.write().await;
        handles
            .entry(handle.name().to_string())
            .or_insert_with(|| Arc::new(handle))
            .clone()
    }

    /// Drop the cached handle so the next access reloads from storage.
    pub async fn evict(&self, collection: &str) -> bool {
        self.handles.write().await.remove(collection).is_some()
    }

    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }
}
