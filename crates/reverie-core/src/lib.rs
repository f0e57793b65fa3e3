// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Reverie memory engine.
//!
//! This crate provides the trait definitions, error type, and common types
//! shared by every workspace crate. External collaborators (embedding
//! gateways, enrichment backends, durable storage) implement traits defined
//! here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ReverieError;
pub use types::{AdapterType, ChatMessage, ChatRole, HealthStatus, Relation, SceneEnrichment};

pub use traits::{
    EmbeddingAdapter, EnrichmentAdapter, PluginAdapter, StorageAdapter, TokenCounter,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverie_error_has_all_variants() {
        let _config = ReverieError::Config("test".into());
        let _storage = ReverieError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _provider = ReverieError::Provider {
            message: "test".into(),
            source: None,
        };
        let _dims = ReverieError::DimensionMismatch {
            collection: "c".into(),
            expected: 3,
            actual: 4,
        };
        let _contract = ReverieError::Contract("test".into());
        let _not_found = ReverieError::NotFound {
            kind: "memory".into(),
            id: "m-1".into(),
        };
        let _timeout = ReverieError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = ReverieError::Internal("test".into());
    }

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Storage,
            AdapterType::Embedding,
            AdapterType::Enrichment,
        ] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn enrichment_types_are_exported_at_root() {
        let scene = SceneEnrichment {
            relations: vec![Relation {
                source: "Mira".into(),
                relation: "owns".into(),
                target: "key".into(),
            }],
            ..SceneEnrichment::default()
        };
        assert_eq!(scene.importance, 5);
        assert_eq!(scene.relations.len(), 1);
    }

    #[test]
    fn health_status_variants() {
        assert_eq!(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_ne!(HealthStatus::Degraded("slow".into()), HealthStatus::Healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), HealthStatus::Healthy);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_embedding_adapter<T: EmbeddingAdapter>() {}
        fn _assert_enrichment_adapter<T: EnrichmentAdapter>() {}
        fn _assert_token_counter<T: TokenCounter>() {}
    }
}
