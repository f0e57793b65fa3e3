// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Reverie memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Reverie configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReverieConfig {
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding gateway settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Scene enrichment backend settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Memory chunking, ranking, and index settings.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("reverie").join("reverie.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("reverie.db"))
        .to_string_lossy()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Embedding gateway configuration.
///
/// Passed to every ingestion and retrieval call so a conversation can be
/// bound to a specific embedding model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Provider identifier. Only OpenAI-compatible endpoints are built in.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible API (without `/embeddings`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. `None` is only valid for providers that need no credentials.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Requested output dimensionality for models that support it.
    #[serde(default)]
    pub dimensions: Option<usize>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: default_base_url(),
            api_key: None,
            dimensions: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Local providers (e.g. an Ollama or llama.cpp server) run without API keys.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self.provider.as_str(), "ollama" | "local" | "mock")
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Scene enrichment backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    /// When false, turns are stored with fallback enrichment only.
    #[serde(default = "default_enrichment_enabled")]
    pub enabled: bool,

    /// Chat model used for scene summarization.
    #[serde(default = "default_enrichment_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key for the enrichment backend.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum tokens the summarization call may generate.
    #[serde(default = "default_enrichment_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: default_enrichment_enabled(),
            model: default_enrichment_model(),
            base_url: default_base_url(),
            api_key: None,
            max_tokens: default_enrichment_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_enrichment_enabled() -> bool {
    true
}

fn default_enrichment_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_enrichment_max_tokens() -> u32 {
    512
}

/// Memory engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Maximum chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters carried over from the previous chunk.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Default number of memories returned by retrieval.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Default token budget for retrieved memories.
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Number of most recent context turns checked for duplicates.
    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,

    /// Weight of vector relevance in the composite score.
    #[serde(default = "default_relevance_weight")]
    pub relevance_weight: f64,

    /// Weight of normalized importance in the composite score.
    #[serde(default = "default_importance_weight")]
    pub importance_weight: f64,

    /// Weight of normalized recency in the composite score.
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    /// Candidate pool oversampling factor relative to `k`.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// Minimum candidate pool size.
    #[serde(default = "default_min_candidate_pool")]
    pub min_candidate_pool: usize,

    /// Maximum sanitized facts kept per turn.
    #[serde(default = "default_max_facts")]
    pub max_facts: usize,

    /// Tokenizer encoding used for budget accounting.
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,

    /// ANN index parameters.
    #[serde(default)]
    pub index: IndexConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            token_budget: default_token_budget(),
            dedup_window: default_dedup_window(),
            relevance_weight: default_relevance_weight(),
            importance_weight: default_importance_weight(),
            recency_weight: default_recency_weight(),
            candidate_multiplier: default_candidate_multiplier(),
            min_candidate_pool: default_min_candidate_pool(),
            max_facts: default_max_facts(),
            tokenizer: default_tokenizer(),
            index: IndexConfig::default(),
        }
    }
}

fn default_chunk_size() -> usize {
    2000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_top_k() -> usize {
    5
}

fn default_token_budget() -> usize {
    1000
}

fn default_dedup_window() -> usize {
    8
}

fn default_relevance_weight() -> f64 {
    0.6
}

fn default_importance_weight() -> f64 {
    0.3
}

fn default_recency_weight() -> f64 {
    0.1
}

fn default_candidate_multiplier() -> usize {
    10
}

fn default_min_candidate_pool() -> usize {
    10
}

fn default_max_facts() -> usize {
    8
}

fn default_tokenizer() -> String {
    "cl100k_base".to_string()
}

/// HNSW index parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Maximum neighbors per node on upper layers (layer 0 uses twice this).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Candidate list size while building the graph.
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    /// Candidate list size while searching.
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,

    /// Capacity of a freshly created index; doubled on demand.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
            initial_capacity: default_initial_capacity(),
        }
    }
}

fn default_max_connections() -> usize {
    16
}

fn default_ef_construction() -> usize {
    200
}

fn default_ef_search() -> usize {
    64
}

fn default_initial_capacity() -> usize {
    128
}
