// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the memory engine's external collaborators.
//!
//! All async adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod embedding;
pub mod enrichment;
pub mod storage;
pub mod tokenizer;

pub use adapter::PluginAdapter;
pub use embedding::EmbeddingAdapter;
pub use enrichment::EnrichmentAdapter;
pub use storage::StorageAdapter;
pub use tokenizer::TokenCounter;
