// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible collaborators for the Reverie memory engine.
//!
//! This crate implements [`EmbeddingAdapter`] over `POST /embeddings` and
//! [`EnrichmentAdapter`] over `POST /chat/completions`. Any server speaking
//! the OpenAI protocol (OpenAI, Ollama, llama.cpp, vLLM) can back either.
//!
//! [`EmbeddingAdapter`]: reverie_core::EmbeddingAdapter
//! [`EnrichmentAdapter`]: reverie_core::EnrichmentAdapter

pub mod client;
pub mod embedder;
pub mod enricher;
pub mod types;

pub use client::OpenAiClient;
pub use embedder::OpenAiEmbedder;
pub use enricher::OpenAiEnricher;

/// Environment variable consulted when no key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// API key resolution order: configured value, then `OPENAI_API_KEY`.
pub fn resolve_api_key(configured: Option<&str>) -> Option<String> {
    if let Some(key) = configured
        && !key.is_empty()
    {
        return Some(key.to_string());
    }
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}
