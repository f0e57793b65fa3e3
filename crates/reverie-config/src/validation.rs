// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: ranges, relationships
//! between fields, and recognized names.

use crate::diagnostic::ConfigError;
use crate::model::{IndexConfig, MemoryConfig, ReverieConfig};

/// Tokenizer encodings accepted by `memory.tokenizer`.
pub const KNOWN_TOKENIZERS: &[&str] = &["cl100k_base", "o200k_base", "p50k_base", "r50k_base"];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ReverieConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::validation(
            "logging.level",
            format!(
                "`{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path",
            "must not be empty",
        ));
    }

    if config.embedding.base_url.trim().is_empty() {
        errors.push(ConfigError::validation("embedding.base_url", "must not be empty"));
    }
    if config.embedding.dimensions == Some(0) {
        errors.push(ConfigError::validation(
            "embedding.dimensions",
            "must be greater than 0 when set",
        ));
    }
    if config.enrichment.enabled && config.enrichment.base_url.trim().is_empty() {
        errors.push(ConfigError::validation(
            "enrichment.base_url",
            "must not be empty while enrichment is enabled",
        ));
    }

    validate_memory(&config.memory, &mut errors);
    validate_index(&config.memory.index, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_memory(memory: &MemoryConfig, errors: &mut Vec<ConfigError>) {
    if memory.chunk_size == 0 {
        errors.push(ConfigError::validation("memory.chunk_size", "must be greater than 0"));
    } else if memory.chunk_overlap >= memory.chunk_size {
        errors.push(ConfigError::validation(
            "memory.chunk_overlap",
            format!(
                "must be smaller than chunk_size ({}), got {}",
                memory.chunk_size, memory.chunk_overlap
            ),
        ));
    }

    let weights = [
        ("memory.relevance_weight", memory.relevance_weight),
        ("memory.importance_weight", memory.importance_weight),
        ("memory.recency_weight", memory.recency_weight),
    ];
    let mut all_valid = true;
    for (key, weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            all_valid = false;
            errors.push(ConfigError::validation(
                key,
                format!("must be a non-negative number, got {weight}"),
            ));
        }
    }
    if all_valid && weights.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
        errors.push(ConfigError::validation(
            "memory.relevance_weight",
            "scoring weights must not all be zero",
        ));
    }

    if memory.dedup_window == 0 {
        errors.push(ConfigError::validation("memory.dedup_window", "must be at least 1"));
    }
    if memory.candidate_multiplier == 0 {
        errors.push(ConfigError::validation(
            "memory.candidate_multiplier",
            "must be at least 1",
        ));
    }
    if !KNOWN_TOKENIZERS.contains(&memory.tokenizer.as_str()) {
        errors.push(ConfigError::validation(
            "memory.tokenizer",
            format!(
                "unknown tokenizer `{}`, expected one of {}",
                memory.tokenizer,
                KNOWN_TOKENIZERS.join(", ")
            ),
        ));
    }
}

fn validate_index(index: &IndexConfig, errors: &mut Vec<ConfigError>) {
    if index.max_connections < 2 {
        errors.push(ConfigError::validation(
            "memory.index.max_connections",
            format!("must be at least 2, got {}", index.max_connections),
        ));
    }
    if index.ef_construction < index.max_connections {
        errors.push(ConfigError::validation(
            "memory.index.ef_construction",
            format!(
                "must be at least max_connections ({}), got {}",
                index.max_connections, index.ef_construction
            ),
        ));
    }
    if index.ef_search == 0 {
        errors.push(ConfigError::validation("memory.index.ef_search", "must be at least 1"));
    }
    if index.initial_capacity == 0 {
        errors.push(ConfigError::validation(
            "memory.index.initial_capacity",
            "must be at least 1",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(errors: &[ConfigError]) -> Vec<String> {
        errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::Validation { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ReverieConfig::default()).is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let mut config = ReverieConfig::default();
        config.memory.chunk_size = 100;
        config.memory.chunk_overlap = 100;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["memory.chunk_overlap"]);
    }

    #[test]
    fn zero_weights_rejected() {
        let mut config = ReverieConfig::default();
        config.memory.relevance_weight = 0.0;
        config.memory.importance_weight = 0.0;
        config.memory.recency_weight = 0.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = ReverieConfig::default();
        config.storage.database_path = "  ".into();
        config.memory.dedup_window = 0;
        config.memory.tokenizer = "gpt2-ish".into();
        config.memory.index.max_connections = 1;
        config.memory.index.initial_capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            keys(&errors),
            vec![
                "storage.database_path",
                "memory.dedup_window",
                "memory.tokenizer",
                "memory.index.max_connections",
                "memory.index.initial_capacity",
            ]
        );
    }

    #[test]
    fn negative_weight_reported_per_key() {
        let mut config = ReverieConfig::default();
        config.memory.recency_weight = -0.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["memory.recency_weight"]);
    }

    #[test]
    fn ef_construction_below_connections_rejected() {
        let mut config = ReverieConfig::default();
        config.memory.index.ef_construction = 8;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["memory.index.ef_construction"]);
    }
}
