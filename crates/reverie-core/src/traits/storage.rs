// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the durable blob and record store.

use async_trait::async_trait;

use crate::error::ReverieError;
use crate::traits::adapter::PluginAdapter;

/// Adapter for durable persistence of vector indexes and memory metadata.
///
/// Three independent keyspaces are exposed: serialized index blobs keyed by
/// collection, metadata records keyed by `collection:memoryId`, and a small
/// dimension record per collection. Everything written must read back
/// byte-for-byte identical.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ReverieError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ReverieError>;

    // --- Index blobs ---

    /// Read the serialized index for a collection.
    async fn get_index_blob(&self, collection: &str) -> Result<Option<Vec<u8>>, ReverieError>;

    /// Replace the serialized index for a collection.
    async fn put_index_blob(&self, collection: &str, data: Vec<u8>) -> Result<(), ReverieError>;

    /// Remove the serialized index for a collection. Missing blobs are not an error.
    async fn delete_index_blob(&self, collection: &str) -> Result<(), ReverieError>;

    // --- Metadata records ---

    /// List all `(key, value)` records whose key starts with `prefix`.
    async fn list_records(&self, prefix: &str) -> Result<Vec<(String, String)>, ReverieError>;

    /// Upsert records atomically.
    async fn put_records(&self, records: Vec<(String, String)>) -> Result<(), ReverieError>;

    /// Delete records by exact key. Missing keys are ignored.
    async fn delete_records(&self, keys: Vec<String>) -> Result<(), ReverieError>;

    /// Delete every record whose key starts with `prefix`, returning how many were removed.
    async fn delete_records_with_prefix(&self, prefix: &str) -> Result<usize, ReverieError>;

    // --- Dimension records ---

    /// Read the persisted vector dimensionality for a collection.
    async fn get_dimensions(&self, collection: &str) -> Result<Option<usize>, ReverieError>;

    /// Persist the vector dimensionality for a collection.
    async fn put_dimensions(&self, collection: &str, dimensions: usize) -> Result<(), ReverieError>;

    /// Remove the dimension record for a collection.
    async fn delete_dimensions(&self, collection: &str) -> Result<(), ReverieError>;
}
