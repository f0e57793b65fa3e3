// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use reverie_config::model::StorageConfig;
use reverie_core::{AdapterType, HealthStatus, PluginAdapter, ReverieError, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened lazily by [`StorageAdapter::initialize`]; every
/// other operation fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ReverieError> {
        self.db
            .get()
            .ok_or_else(|| {
                ReverieError::storage("storage not initialized -- call initialize() first")
            })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ReverieError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ReverieError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ReverieError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| ReverieError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ReverieError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn get_index_blob(&self, collection: &str) -> Result<Option<Vec<u8>>, ReverieError> {
        queries::blobs::get_blob(self.db()?, collection).await
    }

    async fn put_index_blob(&self, collection: &str, data: Vec<u8>) -> Result<(), ReverieError> {
        queries::blobs::put_blob(self.db()?, collection, data).await
    }

    async fn delete_index_blob(&self, collection: &str) -> Result<(), ReverieError> {
        queries::blobs::delete_blob(self.db()?, collection).await
    }

    async fn list_records(&self, prefix: &str) -> Result<Vec<(String, String)>, ReverieError> {
        queries::records::list_records(self.db()?, prefix).await
    }

    async fn put_records(&self, records: Vec<(String, String)>) -> Result<(), ReverieError> {
        queries::records::put_records(self.db()?, records).await
    }

    async fn delete_records(&self, keys: Vec<String>) -> Result<(), ReverieError> {
        queries::records::delete_records(self.db()?, keys).await
    }

    async fn delete_records_with_prefix(&self, prefix: &str) -> Result<usize, ReverieError> {
        queries::records::delete_records_with_prefix(self.db()?, prefix).await
    }

    async fn get_dimensions(&self, collection: &str) -> Result<Option<usize>, ReverieError> {
        queries::dimensions::get_dimensions(self.db()?, collection).await
    }

    async fn put_dimensions(
        &self,
        collection: &str,
        dimensions: usize,
    ) -> Result<(), ReverieError> {
        queries::dimensions::put_dimensions(self.db()?, collection, dimensions).await
    }

    async fn delete_dimensions(&self, collection: &str) -> Result<(), ReverieError> {
        queries::dimensions::delete_dimensions(self.db()?, collection).await
    }
}
