// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedding adapter for tests.
//!
//! Vectors are hashed bags of words: each lowercase word bumps one
//! hash-selected component, and the result is L2-normalized. Texts that share
//! words land close together, so similarity ordering is predictable.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use reverie_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use reverie_core::{EmbeddingAdapter, PluginAdapter, ReverieError};

/// How the next `embed` calls misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedFailure {
    None,
    /// Return a provider error.
    Provider,
    /// Return one vector fewer than requested.
    DropOne,
}

pub struct MockEmbedder {
    dimensions: AtomicUsize,
    calls: AtomicUsize,
    failing: AtomicBool,
    drop_one: AtomicBool,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: AtomicUsize::new(dimensions),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            drop_one: AtomicBool::new(false),
        }
    }

    /// Switch the produced dimension, as if the embedding model changed.
    pub fn set_dimensions(&self, dimensions: usize) {
        self.dimensions.store(dimensions, Ordering::SeqCst);
    }

    pub fn set_failure(&self, failure: EmbedFailure) {
        self.failing
            .store(failure == EmbedFailure::Provider, Ordering::SeqCst);
        self.drop_one
            .store(failure == EmbedFailure::DropOne, Ordering::SeqCst);
    }

    /// Number of `embed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this embedder produces for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        hashed_vector(text, self.dimensions.load(Ordering::SeqCst))
    }
}

/// Bag-of-words vector over `dimensions` hashed buckets, unit length.
pub fn hashed_vector(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimensions];
    if dimensions == 0 {
        return vector;
    }
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = (fnv1a(&word.to_lowercase()) % dimensions as u64) as usize;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector[0] = 1.0;
    } else {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, ReverieError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ReverieError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, ReverieError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReverieError::Provider {
                message: "mock embedder failure".into(),
                source: None,
            });
        }

        let dimensions = self.dimensions.load(Ordering::SeqCst);
        let mut embeddings: Vec<Vec<f32>> = input
            .texts
            .iter()
            .map(|t| hashed_vector(t, dimensions))
            .collect();
        if self.drop_one.load(Ordering::SeqCst) {
            embeddings.pop();
        }
        Ok(EmbeddingOutput {
            embeddings,
            dimensions,
        })
    }
}
