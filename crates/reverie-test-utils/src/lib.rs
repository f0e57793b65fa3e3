// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Reverie integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockEmbedder`] - Hashed bag-of-words embeddings with fault injection
//! - [`MockEnricher`] - Queued enrichment responses
//! - [`WordTokenizer`] - One token per word
//! - [`InMemoryStorage`] - Storage adapter with injectable write failures
//! - [`TestHarness`] - A memory service wired to all of the above

pub mod harness;
pub mod memory_storage;
pub mod mock_embedder;
pub mod mock_enricher;
pub mod word_tokenizer;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_storage::InMemoryStorage;
pub use mock_embedder::{hashed_vector, EmbedFailure, MockEmbedder};
pub use mock_enricher::MockEnricher;
pub use word_tokenizer::WordTokenizer;
