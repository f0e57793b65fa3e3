// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Reverie configuration system.

use std::path::Path;

use reverie_config::diagnostic::ConfigError;
use reverie_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with every section deserializes successfully.
#[test]
fn full_config_deserializes() {
    let toml = r#"
[logging]
level = "debug"

[storage]
database_path = "/tmp/reverie-test.db"
wal_mode = false

[embedding]
provider = "openai"
model = "text-embedding-3-large"
base_url = "http://localhost:8080/v1"
api_key = "sk-test"
dimensions = 256
timeout_secs = 5

[enrichment]
enabled = false
model = "gpt-4o"
max_tokens = 128

[memory]
chunk_size = 800
chunk_overlap = 40
top_k = 3
token_budget = 400
dedup_window = 4
relevance_weight = 0.5
importance_weight = 0.25
recency_weight = 0.25
tokenizer = "o200k_base"

[memory.index]
max_connections = 8
ef_construction = 100
ef_search = 32
initial_capacity = 16
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/reverie-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.embedding.model, "text-embedding-3-large");
    assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.embedding.dimensions, Some(256));
    assert!(!config.enrichment.enabled);
    assert_eq!(config.enrichment.max_tokens, 128);
    assert_eq!(config.memory.chunk_size, 800);
    assert_eq!(config.memory.tokenizer, "o200k_base");
    assert_eq!(config.memory.index.max_connections, 8);
    assert_eq!(config.memory.index.initial_capacity, 16);
}

/// Empty TOML yields the compiled defaults.
#[test]
fn empty_config_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.logging.level, "info");
    assert!(config.storage.wal_mode);
    assert_eq!(config.embedding.provider, "openai");
    assert_eq!(config.embedding.model, "text-embedding-3-small");
    assert_eq!(config.embedding.base_url, "https://api.openai.com/v1");
    assert!(config.embedding.api_key.is_none());
    assert!(config.enrichment.enabled);
    assert_eq!(config.enrichment.model, "gpt-4o-mini");
    assert_eq!(config.memory.chunk_size, 2000);
    assert_eq!(config.memory.chunk_overlap, 100);
    assert_eq!(config.memory.top_k, 5);
    assert_eq!(config.memory.token_budget, 1000);
    assert_eq!(config.memory.dedup_window, 8);
    assert_eq!(config.memory.max_facts, 8);
    assert_eq!(config.memory.index.ef_search, 64);
    assert!(config.storage.database_path.ends_with("reverie.db"));
}

/// A typo inside a nested table becomes an UnknownKey diagnostic with a suggestion.
#[test]
fn unknown_key_gets_suggestion() {
    let toml = "[memory.index]\nef_serch = 10\n";
    let errors = load_and_validate_str(toml).expect_err("unknown key should be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "ef_serch");
            assert_eq!(suggestion.as_deref(), Some("ef_search"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Unknown top-level section is rejected.
#[test]
fn unknown_section_rejected() {
    let err = load_config_from_str("[telemetry]\nenabled = true\n").expect_err("should fail");
    assert!(err.to_string().contains("telemetry"), "got: {err}");
}

/// Wrong value type becomes InvalidType with a dotted key.
#[test]
fn wrong_type_reports_dotted_key() {
    let errors = load_and_validate_str("[memory]\nchunk_size = \"big\"\n")
        .expect_err("string for integer should fail");
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert_eq!(key, "memory.chunk_size"),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

/// Parsed but semantically invalid values surface as validation errors.
#[test]
fn semantic_errors_surface_after_parse() {
    let toml = "[memory]\nchunk_size = 100\nchunk_overlap = 200\n";
    let errors = load_and_validate_str(toml).expect_err("overlap >= size");
    assert!(matches!(
        &errors[0],
        ConfigError::Validation { key, .. } if key == "memory.chunk_overlap"
    ));
}

/// Env vars override file values with the explicit section mapping.
#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "reverie.toml",
            "[embedding]\nmodel = \"from-file\"\n\n[memory]\ntop_k = 3\n",
        )?;
        jail.set_env("REVERIE_EMBEDDING_API_KEY", "sk-from-env");
        jail.set_env("REVERIE_MEMORY_TOKEN_BUDGET", "250");
        jail.set_env("REVERIE_MEMORY_INDEX_EF_SEARCH", "12");

        let config = load_and_validate_path(Path::new("reverie.toml"))
            .map_err(|errors| format!("{errors:?}"))?;
        assert_eq!(config.embedding.model, "from-file");
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-from-env"));
        assert_eq!(config.memory.top_k, 3);
        assert_eq!(config.memory.token_budget, 250);
        assert_eq!(config.memory.index.ef_search, 12);
        Ok(())
    });
}
