// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `reverie doctor` command implementation.
//!
//! Runs diagnostic checks against configuration, the memory database and the
//! embedding and enrichment backends.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use reverie_config::model::ReverieConfig;
use reverie_core::{HealthStatus, PluginAdapter, ReverieError, StorageAdapter};
use reverie_memory::TiktokenCounter;
use reverie_openai::{OpenAiEmbedder, OpenAiEnricher};
use reverie_storage::SqliteStorage;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    /// Human-readable message.
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `reverie doctor` command.
///
/// Fails only when at least one check fails; warnings are reported.
pub async fn run_doctor(
    config: &ReverieConfig,
    config_path: Option<&Path>,
    plain: bool,
) -> Result<(), ReverieError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let results = vec![
        check_config(config_path).await,
        check_database(config).await,
        check_tokenizer(&config.memory.tokenizer),
        check_embedding(config).await,
        check_enrichment(config).await,
        check_memory_baseline(),
    ];

    println!();
    println!("  reverie doctor");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;

    for result in &results {
        match result.status {
            CheckStatus::Pass => {}
            CheckStatus::Warn => warn_count += 1,
            CheckStatus::Fail => fail_count += 1,
        }
        println!("{}", render_line(result, use_color));
    }

    println!();
    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    if fail_count > 0 {
        return Err(ReverieError::Internal(format!("{fail_count} check(s) failed")));
    }
    Ok(())
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal().to_string()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow().to_string()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red().to_string()),
        };
        format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!("    {tag} {:<20} {} ({duration_ms}ms)", result.name, result.message)
    }
}

/// Check configuration loads without errors.
async fn check_config(path: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let loaded = match path {
        Some(path) => reverie_config::load_and_validate_path(path),
        None => reverie_config::load_and_validate(),
    };
    match loaded {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Check the database opens, migrates and answers queries.
async fn check_database(config: &ReverieConfig) -> CheckResult {
    let start = Instant::now();
    let db_path = &config.storage.database_path;

    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first use)"),
            start,
        );
    }

    let storage = SqliteStorage::new(config.storage.clone());
    if let Err(e) = storage.initialize().await {
        return CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start);
    }
    let result = health_result("Database", storage.health_check().await, start);
    let _ = storage.close().await;
    result
}

fn check_tokenizer(encoding: &str) -> CheckResult {
    let start = Instant::now();
    match TiktokenCounter::from_name(encoding) {
        Ok(_) => CheckResult::new("Tokenizer", CheckStatus::Pass, encoding, start),
        Err(e) => CheckResult::new("Tokenizer", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_embedding(config: &ReverieConfig) -> CheckResult {
    let start = Instant::now();
    match OpenAiEmbedder::new(&config.embedding) {
        Ok(embedder) => health_result("Embedding", embedder.health_check().await, start),
        Err(e) => CheckResult::new("Embedding", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_enrichment(config: &ReverieConfig) -> CheckResult {
    let start = Instant::now();
    if !config.enrichment.enabled {
        return CheckResult::new("Enrichment", CheckStatus::Pass, "disabled", start);
    }
    match OpenAiEnricher::new(&config.enrichment) {
        Ok(enricher) => health_result("Enrichment", enricher.health_check().await, start),
        Err(e) => CheckResult::new("Enrichment", CheckStatus::Fail, e.to_string(), start),
    }
}

fn health_result(
    name: &str,
    health: Result<HealthStatus, ReverieError>,
    start: Instant,
) -> CheckResult {
    match health {
        Ok(HealthStatus::Healthy) => CheckResult::new(name, CheckStatus::Pass, "healthy", start),
        Ok(HealthStatus::Degraded(reason)) => {
            CheckResult::new(name, CheckStatus::Warn, reason, start)
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            CheckResult::new(name, CheckStatus::Fail, reason, start)
        }
        Err(e) => CheckResult::new(name, CheckStatus::Fail, e.to_string(), start),
    }
}

/// Memory baseline via jemalloc.
fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC",
            start,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_db(path: &str) -> ReverieConfig {
        let mut config = reverie_config::load_and_validate_str("").unwrap();
        config.storage.database_path = path.to_string();
        config
    }

    #[tokio::test]
    async fn missing_database_warns() {
        let config = config_with_db("/tmp/nonexistent-reverie-test-xyz.db");
        let result = check_database(&config).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("not found"));
    }

    #[tokio::test]
    async fn existing_database_passes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doctor.db").to_string_lossy().to_string();
        let config = config_with_db(&path);

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await.unwrap();
        storage.close().await.unwrap();

        let result = check_database(&config).await;
        assert_eq!(result.status, CheckStatus::Pass, "{}", result.message);
    }

    #[test]
    fn unknown_tokenizer_fails() {
        assert_eq!(check_tokenizer("gpt2-ish").status, CheckStatus::Fail);
        assert_eq!(check_tokenizer("cl100k_base").status, CheckStatus::Pass);
    }

    #[test]
    fn health_maps_to_status() {
        let start = Instant::now();
        assert_eq!(
            health_result("x", Ok(HealthStatus::Degraded("slow".into())), start).status,
            CheckStatus::Warn
        );
        assert_eq!(
            health_result("x", Ok(HealthStatus::Unhealthy("down".into())), start).status,
            CheckStatus::Fail
        );
    }

    #[test]
    fn plain_output_has_tags() {
        let result = CheckResult {
            name: "Database".into(),
            status: CheckStatus::Warn,
            message: "slow".into(),
            duration: Duration::from_millis(5),
        };
        let line = render_line(&result, false);
        assert!(line.contains("[WARN] Database"));
        assert!(line.ends_with("slow (5ms)"));
    }

    #[test]
    fn memory_baseline_reports() {
        let result = check_memory_baseline();
        assert!(result.status == CheckStatus::Pass || result.status == CheckStatus::Warn);
    }
}
