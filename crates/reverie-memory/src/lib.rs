// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic memory store for long-running conversations.
//!
//! Conversation turns are sanitized, enriched, chunked, embedded and kept in
//! a per-collection HNSW index. Retrieval re-ranks similarity hits by
//! importance and recency and fits them into a token budget.
//!
//! ## Architecture
//!
//! - **chunker**: sentence-aware splitting with overlap
//! - **sanitize**: removal of per-turn instructions, fact extraction
//! - **enricher**: scene metadata with a fallback when the backend fails
//! - **index**: the approximate nearest-neighbor graph and its blob format
//! - **manager** / **registry**: collection load, persist and delete
//! - **ranker**: dedup filter, composite score, token budget
//! - **lifecycle**: chronological chain upkeep
//! - **service**: the [`MemoryService`] facade

pub mod chunker;
pub mod enricher;
pub mod index;
pub mod lifecycle;
pub mod manager;
pub mod ranker;
pub mod registry;
pub mod sanitize;
pub mod service;
pub mod tokens;
pub mod types;

pub use enricher::{SceneEnricher, TurnEnrichment};
pub use index::{HnswConfig, HnswIndex};
pub use manager::{CollectionIndex, IndexManager};
pub use ranker::{RankingWeights, RetrievalRanker};
pub use registry::{CollectionHandle, IndexRegistry};
pub use service::MemoryService;
pub use tokens::TiktokenCounter;
pub use types::*;
