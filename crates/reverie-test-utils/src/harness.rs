// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness assembling a complete memory service over mock adapters.
//!
//! `TestHarness` wires a [`MemoryService`] to [`MockEmbedder`],
//! [`MockEnricher`], [`WordTokenizer`] and either [`InMemoryStorage`] or a
//! SQLite database in a temp directory. [`TestHarness::restart`] builds a
//! fresh service over the same storage to exercise reload paths.

use std::sync::Arc;

use reverie_config::{EmbeddingConfig, MemoryConfig, StorageConfig};
use reverie_core::{ChatMessage, ChatRole, ReverieError, StorageAdapter};
use reverie_memory::{IndexRegistry, MemoryService, SceneEnricher};
use reverie_storage::SqliteStorage;

use crate::memory_storage::InMemoryStorage;
use crate::mock_embedder::MockEmbedder;
use crate::mock_enricher::MockEnricher;
use crate::word_tokenizer::WordTokenizer;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    dimensions: usize,
    memory: MemoryConfig,
    responses: Vec<String>,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            dimensions: 32,
            memory: MemoryConfig::default(),
            responses: Vec::new(),
            sqlite: false,
        }
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_memory_config(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Queue raw enrichment responses.
    pub fn with_enrichment_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Persist to SQLite in a temp directory instead of memory.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, ReverieError> {
        let mut memory_storage = None;
        let mut temp_dir = None;
        let storage: Arc<dyn StorageAdapter> = if self.sqlite {
            let dir = tempfile::TempDir::new().map_err(ReverieError::storage)?;
            let sqlite = SqliteStorage::new(StorageConfig {
                database_path: dir.path().join("test.db").to_string_lossy().to_string(),
                wal_mode: true,
            });
            sqlite.initialize().await?;
            temp_dir = Some(dir);
            Arc::new(sqlite)
        } else {
            let memory = Arc::new(InMemoryStorage::new());
            memory_storage = Some(memory.clone());
            memory
        };

        let embedder = Arc::new(MockEmbedder::new(self.dimensions));
        let enricher = Arc::new(MockEnricher::with_responses(self.responses));
        let embedding = EmbeddingConfig {
            provider: "mock".into(),
            model: "mock-embedding".into(),
            ..EmbeddingConfig::default()
        };

        let service = Arc::new(build_service(&storage, &embedder, &enricher, &self.memory));
        Ok(TestHarness {
            service,
            storage,
            memory_storage,
            embedder,
            enricher,
            embedding,
            memory: self.memory,
            _temp_dir: temp_dir,
        })
    }
}

fn build_service(
    storage: &Arc<dyn StorageAdapter>,
    embedder: &Arc<MockEmbedder>,
    enricher: &Arc<MockEnricher>,
    memory: &MemoryConfig,
) -> MemoryService {
    MemoryService::new(
        storage.clone(),
        Arc::new(IndexRegistry::new()),
        embedder.clone(),
        Arc::new(WordTokenizer),
        memory.clone(),
    )
    .with_enricher(SceneEnricher::new(Some(enricher.clone()), memory.max_facts))
}

/// A memory service over mock collaborators.
pub struct TestHarness {
    pub service: Arc<MemoryService>,
    pub storage: Arc<dyn StorageAdapter>,
    /// The in-memory backend, when not running on SQLite.
    pub memory_storage: Option<Arc<InMemoryStorage>>,
    pub embedder: Arc<MockEmbedder>,
    pub enricher: Arc<MockEnricher>,
    /// Embedding settings accepted by the mock embedder.
    pub embedding: EmbeddingConfig,
    pub memory: MemoryConfig,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Replace the service with one that has an empty registry, as after a process restart.
    pub fn restart(&mut self) {
        self.service = Arc::new(build_service(
            &self.storage,
            &self.embedder,
            &self.enricher,
            &self.memory,
        ));
    }

    /// Ingest a user + model turn; returns the number of memories created.
    pub async fn ingest_turn(
        &self,
        collection: &str,
        user: (&str, &str),
        model: (&str, &str),
        chunk_size: usize,
    ) -> Result<usize, ReverieError> {
        let messages = [
            ChatMessage::new(user.0, ChatRole::User, user.1),
            ChatMessage::new(model.0, ChatRole::Model, model.1),
        ];
        self.service
            .add_messages_to_collection(collection, &messages, &self.embedding, chunk_size)
            .await
    }

    /// Search with the configured defaults and no active context.
    pub async fn search(&self, collection: &str, query: &str) -> Vec<reverie_memory::Memory> {
        self.service
            .search_relevant_memories(
                collection,
                query,
                &self.embedding,
                &[],
                self.memory.top_k,
                self.memory.token_budget,
            )
            .await
    }
}
