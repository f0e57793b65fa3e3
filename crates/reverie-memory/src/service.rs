// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory service consumed by the chat application.
//!
//! Failures of the memory layer must never block a conversation: ingestion
//! logs and skips on configuration or transient errors, retrieval degrades to
//! an empty result. Only contract violations by a collaborator propagate.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use reverie_config::{EmbeddingConfig, MemoryConfig};
use reverie_core::types::{EmbeddingInput, EmbeddingOutput, EmbeddingRole, DEFAULT_IMPORTANCE};
use reverie_core::{ChatMessage, EmbeddingAdapter, ReverieError, StorageAdapter, TokenCounter};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chunker::chunk_text;
use crate::enricher::SceneEnricher;
use crate::index::HnswConfig;
use crate::lifecycle;
use crate::manager::IndexManager;
use crate::ranker::RetrievalRanker;
use crate::registry::IndexRegistry;
use crate::sanitize::{extract_facts, sanitize, strip_ephemeral, strip_role_prefixes};
use crate::types::{record_key, CollectionStats, Memory};

/// Tag given to memories inserted through [`MemoryService::add_memory`].
pub const MANUAL_TAG: &str = "manual";

/// Semantic memory store over one storage backend.
pub struct MemoryService {
    manager: IndexManager,
    embedder: Arc<dyn EmbeddingAdapter>,
    enricher: SceneEnricher,
    ranker: RetrievalRanker,
    config: MemoryConfig,
}

impl MemoryService {
    /// Creates a service without an enrichment backend.
    ///
    /// The registry is owned by the caller so several services (or a service
    /// and a diagnostic tool) can share loaded collections.
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        registry: Arc<IndexRegistry>,
        embedder: Arc<dyn EmbeddingAdapter>,
        tokenizer: Arc<dyn TokenCounter>,
        config: MemoryConfig,
    ) -> Self {
        let manager = IndexManager::new(storage, registry, HnswConfig::from(&config.index));
        Self {
            manager,
            embedder,
            enricher: SceneEnricher::new(None, config.max_facts),
            ranker: RetrievalRanker::new(&config, tokenizer),
            config,
        }
    }

    pub fn with_enricher(mut self, enricher: SceneEnricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        self.manager.storage()
    }

    /// Turn a conversation turn into one memory per chunk.
    ///
    /// Returns the number of memories created; 0 when the turn was empty
    /// after sanitization or ingestion was skipped. `chunk_size` of 0 uses
    /// the configured size.
    pub async fn add_messages_to_collection(
        &self,
        collection: &str,
        messages: &[ChatMessage],
        embedding: &EmbeddingConfig,
        chunk_size: usize,
    ) -> Result<usize, ReverieError> {
        let labeled = render_turn(messages);
        let sanitized = strip_role_prefixes(&labeled);
        if sanitized.is_empty() {
            debug!(
                collection,
                messages = messages.len(),
                "turn empty after sanitization, skipping"
            );
            return Ok(0);
        }

        let turn = self.enricher.enrich_turn(&sanitized).await;
        let max_chars = if chunk_size == 0 {
            self.config.chunk_size
        } else {
            chunk_size
        };
        let chunks = chunk_text(&labeled, max_chars, self.config.chunk_overlap);

        let output = match self
            .embed(chunks.clone(), EmbeddingRole::Document, embedding)
            .await
        {
            Ok(output) => output,
            Err(e) if e.is_contract() => return Err(e),
            Err(e) => {
                warn!(collection, error = %e, "embedding failed, turn not memorized");
                return Ok(0);
            }
        };

        let source_ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
        let total = chunks.len();
        let batch = chunks
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let summary = if total > 1 {
                    format!("[Part {}/{}] {}", i + 1, total, turn.scene.summary)
                } else {
                    turn.scene.summary.clone()
                };
                Memory {
                    id: Uuid::new_v4().to_string(),
                    source_message_ids: source_ids.clone(),
                    timestamp: 0,
                    full_text: text,
                    summary,
                    sanitized_facts: turn.facts.clone(),
                    tags: turn.scene.tags.clone(),
                    importance: turn.scene.importance,
                    mood: turn.scene.mood.clone(),
                    relations: turn.scene.relations.clone(),
                    previous_memory_id: None,
                    next_memory_id: None,
                }
            })
            .collect();

        self.append_batch(collection, output, batch).await
    }

    /// Insert one manually written memory, bypassing chunking and enrichment.
    ///
    /// Returns the new memory's id, or `None` if it was skipped.
    pub async fn add_memory(
        &self,
        collection: &str,
        text: &str,
        embedding: &EmbeddingConfig,
    ) -> Result<Option<String>, ReverieError> {
        let sanitized = sanitize(text);
        if sanitized.is_empty() {
            debug!(collection, "manual memory empty after sanitization, skipping");
            return Ok(None);
        }

        let output = match self
            .embed(vec![sanitized.clone()], EmbeddingRole::Document, embedding)
            .await
        {
            Ok(output) => output,
            Err(e) if e.is_contract() => return Err(e),
            Err(e) => {
                warn!(collection, error = %e, "embedding failed, manual memory not stored");
                return Ok(None);
            }
        };

        let id = Uuid::new_v4().to_string();
        let memory = Memory {
            id: id.clone(),
            source_message_ids: Vec::new(),
            timestamp: 0,
            full_text: sanitized.clone(),
            summary: sanitized.clone(),
            sanitized_facts: extract_facts(&[sanitized.as_str()], self.config.max_facts),
            tags: vec![MANUAL_TAG.to_string()],
            importance: DEFAULT_IMPORTANCE,
            mood: None,
            relations: Vec::new(),
            previous_memory_id: None,
            next_memory_id: None,
        };

        let inserted = self.append_batch(collection, output, vec![memory]).await?;
        Ok((inserted == 1).then_some(id))
    }

    /// Memories relevant to `query`, ranked and fitted into `token_budget`.
    ///
    /// Never fails: any error yields an empty result.
    pub async fn search_relevant_memories(
        &self,
        collection: &str,
        query: &str,
        embedding: &EmbeddingConfig,
        active_context: &[ChatMessage],
        k: usize,
        token_budget: usize,
    ) -> Vec<Memory> {
        match self
            .search(collection, query, embedding, active_context, k, token_budget)
            .await
        {
            Ok(memories) => memories,
            Err(e) if e.is_contract() => {
                error!(
                    collection,
                    error = %e,
                    "embedding backend broke its contract during retrieval"
                );
                Vec::new()
            }
            Err(e) => {
                warn!(
                    collection,
                    error = %e,
                    "memory retrieval failed, continuing without memories"
                );
                Vec::new()
            }
        }
    }

    async fn search(
        &self,
        collection: &str,
        query: &str,
        embedding: &EmbeddingConfig,
        active_context: &[ChatMessage],
        k: usize,
        token_budget: usize,
    ) -> Result<Vec<Memory>, ReverieError> {
        let query = query.trim();
        if query.is_empty() || k == 0 || token_budget == 0 {
            return Ok(Vec::new());
        }

        let handle = self.manager.load_index(collection, None).await?;
        if handle.state().await.stats().searchable == 0 {
            return Ok(Vec::new());
        }

        let output = self
            .embed(vec![query.to_string()], EmbeddingRole::Query, embedding)
            .await?;
        let Some(vector) = output.embeddings.first() else {
            return Ok(Vec::new());
        };

        let candidates = {
            let state = handle.state().await;
            state.check_dimensions(output.dimensions)?;
            let pool = self.ranker.pool_size(k, state.index_len());
            state.search(vector, pool)
        };
        let results = self.ranker.rank(candidates, active_context, k, token_budget);
        debug!(collection, k, token_budget, returned = results.len(), "memories retrieved");
        Ok(results)
    }

    /// Delete memories by id and relink the chain around them.
    ///
    /// Unknown ids are ignored. Returns how many memories were removed. The
    /// relinked neighbors are written before the removed records are deleted,
    /// so a failed write never leaves a survivor linking to a deleted id. The
    /// cached collection is dropped afterwards so the next access reloads it.
    pub async fn delete_memories(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<usize, ReverieError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let handle = self.manager.load_index(collection, None).await?;
        let removal = {
            let mut state = handle.state().await;
            lifecycle::unlink_and_remove(&mut state, ids)
        };
        if removal.removed.is_empty() {
            return Ok(0);
        }

        let keys = removal
            .removed
            .iter()
            .map(|id| record_key(collection, id))
            .collect();
        let result = match self.manager.persist(&handle).await {
            Ok(()) => self.manager.storage().delete_records(keys).await,
            Err(e) => Err(e),
        };
        self.manager.invalidate(collection).await;
        result?;

        info!(
            collection,
            removed = removal.removed.len(),
            relinked = removal.touched.len(),
            "memories deleted"
        );
        Ok(removal.removed.len())
    }

    /// Remove a collection's index, metadata and dimension record.
    pub async fn delete_collection(&self, collection: &str) -> Result<usize, ReverieError> {
        self.manager.delete_collection(collection).await
    }

    /// Every memory of the collection in chronological order.
    pub async fn get_all_memories(&self, collection: &str) -> Result<Vec<Memory>, ReverieError> {
        let handle = self.manager.load_index(collection, None).await?;
        let state = handle.state().await;
        Ok(state.memories())
    }

    pub async fn get_memory(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Memory>, ReverieError> {
        let handle = self.manager.load_index(collection, None).await?;
        let state = handle.state().await;
        Ok(state.get(id).map(|r| r.memory.clone()))
    }

    /// The memory `id` with up to `before` predecessors and `after` successors
    /// along the chain, oldest first.
    pub async fn expand_context(
        &self,
        collection: &str,
        id: &str,
        before: usize,
        after: usize,
    ) -> Result<Vec<Memory>, ReverieError> {
        let handle = self.manager.load_index(collection, None).await?;
        let state = handle.state().await;
        let anchor = state
            .get(id)
            .map(|r| r.memory.clone())
            .ok_or_else(|| ReverieError::NotFound {
                kind: "memory".into(),
                id: id.to_string(),
            })?;

        let mut seen = HashSet::from([anchor.id.clone()]);
        let mut earlier = Vec::new();
        let mut cursor = anchor.previous_memory_id.clone();
        while earlier.len() < before {
            let Some(prev) = cursor.and_then(|p| state.get(&p)) else {
                break;
            };
            if !seen.insert(prev.memory.id.clone()) {
                break;
            }
            cursor = prev.memory.previous_memory_id.clone();
            earlier.push(prev.memory.clone());
        }

        let mut later = Vec::new();
        let mut cursor = anchor.next_memory_id.clone();
        while later.len() < after {
            let Some(next) = cursor.and_then(|n| state.get(&n)) else {
                break;
            };
            if !seen.insert(next.memory.id.clone()) {
                break;
            }
            cursor = next.memory.next_memory_id.clone();
            later.push(next.memory.clone());
        }

        earlier.reverse();
        earlier.push(anchor);
        earlier.extend(later);
        Ok(earlier)
    }

    pub async fn collection_stats(
        &self,
        collection: &str,
    ) -> Result<CollectionStats, ReverieError> {
        let handle = self.manager.load_index(collection, None).await?;
        let stats = handle.state().await.stats();
        Ok(stats)
    }

    async fn embed(
        &self,
        texts: Vec<String>,
        role: EmbeddingRole,
        config: &EmbeddingConfig,
    ) -> Result<EmbeddingOutput, ReverieError> {
        let input = embedding_input(config, texts, role)?;
        let expected = input.texts.len();
        let output = self.embedder.embed(input).await?;
        validate_embeddings(&output, expected)?;
        Ok(output)
    }

    /// Timestamp, chain, insert and persist a batch of new memories.
    async fn append_batch(
        &self,
        collection: &str,
        output: EmbeddingOutput,
        mut batch: Vec<Memory>,
    ) -> Result<usize, ReverieError> {
        let handle = match self
            .manager
            .load_index(collection, Some(output.dimensions))
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                warn!(collection, error = %e, "failed to load collection, memories dropped");
                return Ok(0);
            }
        };

        let inserted = {
            let mut state = handle.state().await;
            if let Err(e) = state.check_dimensions(output.dimensions) {
                warn!(collection, error = %e, "embedding dimension rejected, memories dropped");
                return Ok(0);
            }

            let now = Utc::now().timestamp_millis();
            let base = state
                .latest()
                .map_or(now, |latest| now.max(latest.timestamp + 1));
            for (i, memory) in batch.iter_mut().enumerate() {
                memory.timestamp = base + i as i64;
            }
            if let Some(tail) = lifecycle::chain_onto(&mut state, &mut batch) {
                debug!(collection, tail = %tail, "batch chained onto previous tail");
            }

            batch
                .into_iter()
                .zip(&output.embeddings)
                .try_fold(0usize, |count, (memory, vector)| {
                    state.insert(vector, memory).map(|_| count + 1)
                })
        };

        let count = match inserted {
            Ok(count) => count,
            Err(e) => {
                self.manager.invalidate(collection).await;
                if e.is_contract() {
                    return Err(e);
                }
                warn!(collection, error = %e, "index insert failed, memories dropped");
                return Ok(0);
            }
        };

        if let Err(e) = self.manager.persist(&handle).await {
            warn!(collection, error = %e, "failed to persist collection, memories dropped");
            self.manager.invalidate(collection).await;
            return Ok(0);
        }
        info!(collection, memories = count, dims = output.dimensions, "memories added");
        Ok(count)
    }
}

/// Build the embedding request for `config`.
///
/// A provider that needs credentials but has none is a configuration error.
pub fn embedding_input(
    config: &EmbeddingConfig,
    texts: Vec<String>,
    role: EmbeddingRole,
) -> Result<EmbeddingInput, ReverieError> {
    let has_key = config
        .api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty());
    if config.requires_api_key() && !has_key {
        return Err(ReverieError::Config(format!(
            "embedding provider `{}` requires an API key",
            config.provider
        )));
    }
    let mut input = EmbeddingInput::new(texts, role);
    input.model = Some(config.model.clone());
    input.dimensions = config.dimensions;
    input.api_key = config.api_key.clone();
    Ok(input)
}

/// One vector per input, all of the advertised non-zero dimension.
fn validate_embeddings(output: &EmbeddingOutput, expected: usize) -> Result<(), ReverieError> {
    if output.embeddings.len() != expected {
        return Err(ReverieError::Contract(format!(
            "{expected} texts but {} embeddings",
            output.embeddings.len()
        )));
    }
    if output.dimensions == 0 {
        return Err(ReverieError::Contract("embedding dimension is zero".into()));
    }
    if let Some(bad) = output
        .embeddings
        .iter()
        .find(|v| v.len() != output.dimensions)
    {
        return Err(ReverieError::Contract(format!(
            "embedding of dimension {} in a batch of dimension {}",
            bad.len(),
            output.dimensions
        )));
    }
    Ok(())
}

/// Role-labeled turn text with ephemeral instructions removed.
fn render_turn(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter_map(|m| {
            let content = strip_ephemeral(&m.content);
            (!content.is_empty()).then(|| format!("{}: {content}", m.role.label()))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_core::ChatRole;

    fn openai() -> EmbeddingConfig {
        EmbeddingConfig::default()
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let err = embedding_input(&openai(), vec!["x".into()], EmbeddingRole::Query).unwrap_err();
        assert!(err.is_configuration());

        let local = EmbeddingConfig {
            provider: "ollama".into(),
            ..EmbeddingConfig::default()
        };
        let input = embedding_input(&local, vec!["x".into()], EmbeddingRole::Document).unwrap();
        assert_eq!(input.model.as_deref(), Some("text-embedding-3-small"));
        assert_eq!(input.role, EmbeddingRole::Document);
    }

    #[test]
    fn embedding_count_mismatch_is_contract_error() {
        let output = EmbeddingOutput {
            embeddings: vec![vec![0.0; 3]],
            dimensions: 3,
        };
        assert!(validate_embeddings(&output, 2).unwrap_err().is_contract());
        assert!(validate_embeddings(&output, 1).is_ok());

        let ragged = EmbeddingOutput {
            embeddings: vec![vec![0.0; 3], vec![0.0; 2]],
            dimensions: 3,
        };
        assert!(validate_embeddings(&ragged, 2).unwrap_err().is_contract());
    }

    #[test]
    fn render_turn_labels_and_strips() {
        let messages = vec![
            ChatMessage::new(
                "u1",
                ChatRole::User,
                "[Instruction For This Turn Only]: do X\n\nHello there.",
            ),
            ChatMessage::new("m1", ChatRole::Model, "((OOC: hidden))"),
            ChatMessage::new("m2", ChatRole::Model, "General Kenobi."),
        ];
        assert_eq!(render_turn(&messages), "User: Hello there.\n\nModel: General Kenobi.");
    }
}
