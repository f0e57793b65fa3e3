// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./reverie.toml` > `~/.config/reverie/reverie.toml` > `/etc/reverie/reverie.toml`
//! with environment variable overrides via `REVERIE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ReverieConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/reverie/reverie.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "reverie.toml";

/// Sections whose env keys are split at the first underscore.
const ENV_SECTIONS: &[&str] = &["logging", "storage", "embedding", "enrichment", "memory"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/reverie/reverie.toml` (system-wide)
/// 3. `~/.config/reverie/reverie.toml` (user XDG config)
/// 4. `./reverie.toml` (local directory)
/// 5. `REVERIE_*` environment variables
pub fn load_config() -> Result<ReverieConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ReverieConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ReverieConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ReverieConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ReverieConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ReverieConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/reverie/reverie.toml`, if the platform has a config dir.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("reverie").join(LOCAL_CONFIG_FILE))
}

/// Create the environment variable provider with explicit section mapping.
///
/// Keys contain underscores (`api_key`, `chunk_size`), so only the first
/// underscore after a known section name becomes a dot:
/// `REVERIE_EMBEDDING_API_KEY` maps to `embedding.api_key`.
fn env_provider() -> Env {
    Env::prefixed("REVERIE_").map(|key| map_env_key(key.as_str()).into())
}

/// Env keys arrive in whatever case they were set; config keys are lower case.
fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            // memory.index.* is the only nested table
            if *section == "memory" {
                if let Some(index_key) = rest.strip_prefix("index_") {
                    return format!("memory.index.{index_key}");
                }
            }
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_at_section_only() {
        assert_eq!(map_env_key("embedding_api_key"), "embedding.api_key");
        assert_eq!(map_env_key("memory_chunk_size"), "memory.chunk_size");
        assert_eq!(map_env_key("memory_index_ef_search"), "memory.index.ef_search");
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(map_env_key("unrelated_key"), "unrelated_key");
    }

    #[test]
    fn upper_case_env_keys_are_mapped() {
        assert_eq!(map_env_key("EMBEDDING_API_KEY"), "embedding.api_key");
        assert_eq!(map_env_key("MEMORY_INDEX_EF_SEARCH"), "memory.index.ef_search");
        assert_eq!(map_env_key("Logging_Level"), "logging.level");
    }

    #[test]
    fn string_overrides_defaults() {
        let config = load_config_from_str("[memory]\nchunk_size = 500\n").unwrap();
        assert_eq!(config.memory.chunk_size, 500);
        assert_eq!(config.memory.chunk_overlap, 100);
    }
}
