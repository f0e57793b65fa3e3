// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process storage adapter with fault injection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use reverie_core::types::{AdapterType, HealthStatus};
use reverie_core::{PluginAdapter, ReverieError, StorageAdapter};

#[derive(Debug, Default)]
struct Inner {
    blobs: HashMap<String, Vec<u8>>,
    records: BTreeMap<String, String>,
    dimensions: HashMap<String, usize>,
}

/// Blob, record and dimension maps behind one lock.
///
/// `fail_writes` makes every mutating call return a storage error without
/// touching state, which simulates a full disk or a revoked handle.
/// `fail_record_puts` fails only `put_records`.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    inner: RwLock<Inner>,
    fail_writes: AtomicBool,
    fail_record_puts: AtomicBool,
    blob_writes: AtomicUsize,
    blob_writes_in_flight: AtomicUsize,
    max_blob_writes_in_flight: AtomicUsize,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_record_puts(&self, fail: bool) {
        self.fail_record_puts.store(fail, Ordering::SeqCst);
    }

    /// Highest number of `put_index_blob` calls seen running at once.
    pub fn max_concurrent_blob_writes(&self) -> usize {
        self.max_blob_writes_in_flight.load(Ordering::SeqCst)
    }

    /// Number of successful `put_index_blob` calls.
    pub fn blob_writes(&self) -> usize {
        self.blob_writes.load(Ordering::SeqCst)
    }

    pub async fn blob(&self, collection: &str) -> Option<Vec<u8>> {
        self.inner.read().await.blobs.get(collection).cloned()
    }

    /// Overwrite the stored blob with garbage.
    pub async fn corrupt_blob(&self, collection: &str) {
        self.inner
            .write()
            .await
            .blobs
            .insert(collection.to_string(), b"definitely not an index".to_vec());
    }

    pub async fn record_keys(&self) -> Vec<String> {
        self.inner.read().await.records.keys().cloned().collect()
    }

    fn check_writable(&self) -> Result<(), ReverieError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ReverieError::storage("injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for InMemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ReverieError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Degraded("writes failing".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ReverieError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn initialize(&self) -> Result<(), ReverieError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ReverieError> {
        Ok(())
    }

    async fn get_index_blob(&self, collection: &str) -> Result<Option<Vec<u8>>, ReverieError> {
        Ok(self.blob(collection).await)
    }

    async fn put_index_blob(&self, collection: &str, data: Vec<u8>) -> Result<(), ReverieError> {
        self.check_writable()?;
        let in_flight = self.blob_writes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_blob_writes_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        // Suspend mid-write so an unserialized second writer would overlap.
        tokio::task::yield_now().await;
        self.inner
            .write()
            .await
            .blobs
            .insert(collection.to_string(), data);
        self.blob_writes_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.blob_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_index_blob(&self, collection: &str) -> Result<(), ReverieError> {
        self.check_writable()?;
        self.inner.write().await.blobs.remove(collection);
        Ok(())
    }

    async fn list_records(&self, prefix: &str) -> Result<Vec<(String, String)>, ReverieError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn put_records(&self, records: Vec<(String, String)>) -> Result<(), ReverieError> {
        self.check_writable()?;
        if self.fail_record_puts.load(Ordering::SeqCst) {
            return Err(ReverieError::storage("injected record write failure"));
        }
        self.inner.write().await.records.extend(records);
        Ok(())
    }

    async fn delete_records(&self, keys: Vec<String>) -> Result<(), ReverieError> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        for key in keys {
            inner.records.remove(&key);
        }
        Ok(())
    }

    async fn delete_records_with_prefix(&self, prefix: &str) -> Result<usize, ReverieError> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        let before = inner.records.len();
        inner.records.retain(|k, _| !k.starts_with(prefix));
        Ok(before - inner.records.len())
    }

    async fn get_dimensions(&self, collection: &str) -> Result<Option<usize>, ReverieError> {
        Ok(self.inner.read().await.dimensions.get(collection).copied())
    }

    async fn put_dimensions(
        &self,
        collection: &str,
        dimensions: usize,
    ) -> Result<(), ReverieError> {
        self.check_writable()?;
        self.inner
            .write()
            .await
            .dimensions
            .insert(collection.to_string(), dimensions);
        Ok(())
    }

    async fn delete_dimensions(&self, collection: &str) -> Result<(), ReverieError> {
        self.check_writable()?;
        self.inner.write().await.dimensions.remove(collection);
        Ok(())
    }
}
