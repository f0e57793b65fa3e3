// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scene enrichment of a sanitized conversation turn.
//!
//! One backend call produces the scene metadata; the sanitized facts are
//! derived locally from the summary and the turn text. A failing or absent
//! backend never blocks ingestion.

use std::sync::Arc;

use reverie_core::{EnrichmentAdapter, SceneEnrichment};
use tracing::{debug, warn};

use crate::sanitize::{extract_facts, DEFAULT_MAX_FACTS};

/// Characters of the turn kept as summary when enrichment is unavailable.
pub const FALLBACK_SUMMARY_CHARS: usize = 240;

/// Enrichment result for one turn, shared by all of its chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnEnrichment {
    pub scene: SceneEnrichment,
    pub facts: Vec<String>,
}

/// Wraps the optional enrichment backend with fallback and fact extraction.
pub struct SceneEnricher {
    backend: Option<Arc<dyn EnrichmentAdapter>>,
    max_facts: usize,
}

impl SceneEnricher {
    pub fn new(backend: Option<Arc<dyn EnrichmentAdapter>>, max_facts: usize) -> Self {
        Self { backend, max_facts }
    }

    /// Enricher that always uses the fallback summary.
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_MAX_FACTS)
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Enrich already-sanitized turn text.
    pub async fn enrich_turn(&self, sanitized: &str) -> TurnEnrichment {
        let mut scene = match self.backend.as_ref() {
            Some(backend) => match backend.enrich(sanitized).await {
                Ok(scene) => {
                    debug!(
                        backend = backend.name(),
                        tags = scene.tags.len(),
                        importance = scene.importance,
                        "turn enriched"
                    );
                    scene
                }
                Err(e) => {
                    warn!(
                        backend = backend.name(),
                        error = %e,
                        "enrichment failed, using fallback summary"
                    );
                    SceneEnrichment::fallback(sanitized, FALLBACK_SUMMARY_CHARS)
                }
            },
            None => SceneEnrichment::fallback(sanitized, FALLBACK_SUMMARY_CHARS),
        };

        if scene.summary.trim().is_empty() {
            scene.summary = SceneEnrichment::fallback(sanitized, FALLBACK_SUMMARY_CHARS).summary;
        }
        scene.importance = scene.importance.clamp(1, 10);

        let facts = extract_facts(&[scene.summary.as_str(), sanitized], self.max_facts);
        TurnEnrichment { scene, facts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reverie_core::{AdapterType, HealthStatus, PluginAdapter, ReverieError};

    struct Fixed(Result<SceneEnrichment, String>);

    #[async_trait]
    impl PluginAdapter for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
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
    impl EnrichmentAdapter for Fixed {
        async fn enrich(&self, _text: &str) -> Result<SceneEnrichment, ReverieError> {
            self.0.clone().map_err(ReverieError::Internal)
        }
    }

    const TURN: &str = "The lighthouse keeper lives on the northern island. He collects old maps.";

    #[tokio::test]
    async fn uses_backend_scene() {
        let scene = SceneEnrichment {
            summary: "A keeper and his maps.".into(),
            tags: vec!["lighthouse".into()],
            importance: 8,
            relations: vec![],
            mood: Some("calm".into()),
        };
        let enricher = SceneEnricher::new(Some(Arc::new(Fixed(Ok(scene.clone())))), 8);
        let out = enricher.enrich_turn(TURN).await;
        assert_eq!(out.scene, scene);
        assert_eq!(out.facts[0], "A keeper and his maps.");
        assert!(out.facts.iter().any(|f| f.contains("northern island")));
    }

    #[tokio::test]
    async fn backend_failure_falls_back() {
        let enricher = SceneEnricher::new(Some(Arc::new(Fixed(Err("down".into())))), 8);
        let out = enricher.enrich_turn(TURN).await;
        assert_eq!(out.scene.importance, 5);
        assert!(out.scene.tags.is_empty());
        assert_eq!(out.scene.summary, TURN);
        assert!(!out.facts.is_empty());
    }

    #[tokio::test]
    async fn empty_summary_is_filled() {
        let enricher = SceneEnricher::new(Some(Arc::new(Fixed(Ok(SceneEnrichment::default())))), 8);
        let out = enricher.enrich_turn(TURN).await;
        assert_eq!(out.scene.summary, TURN);
    }

    #[tokio::test]
    async fn disabled_enricher_truncates_summary() {
        let long = "word ".repeat(200);
        let out = SceneEnricher::disabled().enrich_turn(&long).await;
        assert_eq!(out.scene.summary.chars().count(), FALLBACK_SUMMARY_CHARS);
    }
}
