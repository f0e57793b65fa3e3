// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock enrichment adapter returning queued LLM-style responses.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use reverie_core::types::{AdapterType, HealthStatus, SceneEnrichment};
use reverie_core::{EnrichmentAdapter, PluginAdapter, ReverieError};

/// Pops raw response text from a FIFO queue and parses it like a real backend.
///
/// An empty queue yields a default enrichment; a response that is not a JSON
/// object yields a provider error.
pub struct MockEnricher {
    responses: Arc<Mutex<VecDeque<String>>>,
    received: Arc<Mutex<Vec<String>>>,
}

impl MockEnricher {
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn add_response(&self, text: impl Into<String>) {
        self.responses.lock().await.push_back(text.into());
    }

    /// Every text passed to `enrich`, in call order.
    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }
}

impl Default for MockEnricher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockEnricher {
    fn name(&self) -> &str {
        "mock-enricher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Enrichment
    }

    async fn health_check(&self) -> Result<HealthStatus, ReverieError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ReverieError> {
        Ok(())
    }
}

#[async_trait]
impl EnrichmentAdapter for MockEnricher {
    async fn enrich(&self, text: &str) -> Result<SceneEnrichment, ReverieError> {
        self.received.lock().await.push(text.to_string());
        let Some(response) = self.responses.lock().await.pop_front() else {
            return Ok(SceneEnrichment::default());
        };
        SceneEnrichment::from_llm_response(&response).ok_or_else(|| ReverieError::Provider {
            message: format!("unparseable enrichment response: {response}"),
            source: None,
        })
    }
}
