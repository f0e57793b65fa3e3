// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reverie - long-term semantic memory for roleplay conversations.
//!
//! This is the operator CLI over the memory engine.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod doctor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;

/// Reverie - long-term semantic memory for roleplay conversations.
#[derive(Parser, Debug)]
#[command(name = "reverie", version, about, long_about = None)]
struct Cli {
    /// Explicit config file (skips the XDG lookup).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a conversation turn read from a JSON file of messages.
    Ingest {
        collection: String,
        /// JSON array of `{"id", "role", "content"}` messages.
        #[arg(long)]
        file: PathBuf,
        /// Chunk size in characters (defaults to `memory.chunk_size`).
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Store a manually written memory.
    Remember { collection: String, text: String },
    /// Retrieve the memories most relevant to a query.
    Search {
        collection: String,
        query: String,
        /// Number of results (defaults to `memory.top_k`).
        #[arg(long)]
        k: Option<usize>,
        /// Token budget for the results (defaults to `memory.token_budget`).
        #[arg(long)]
        budget: Option<usize>,
        /// JSON array of message ids currently in the prompt.
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// Print every memory of a collection in chronological order.
    List { collection: String },
    /// Print index and record counters for a collection.
    Stats { collection: String },
    /// Delete memories by id.
    Forget {
        collection: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete a collection with all its memories.
    Drop { collection: String },
    /// Run diagnostic checks against config, storage and backends.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => reverie_config::load_and_validate_path(path),
        None => reverie_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            reverie_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    let result = match cli.command {
        Commands::Doctor { plain } => {
            doctor::run_doctor(&config, cli.config.as_deref(), plain).await
        }
        command => commands::run(command, &config).await,
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        eprintln!("reverie: {e}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reverie={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn search_flags_parse() {
        let cli = Cli::try_parse_from([
            "reverie", "search", "chat-1", "the harbor", "--k", "3", "--budget", "200",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { collection, query, k, budget, context } => {
                assert_eq!(collection, "chat-1");
                assert_eq!(query, "the harbor");
                assert_eq!(k, Some(3));
                assert_eq!(budget, Some(200));
                assert!(context.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn forget_requires_ids() {
        assert!(Cli::try_parse_from(["reverie", "forget", "chat-1"]).is_err());
        let cli = Cli::try_parse_from(["reverie", "forget", "chat-1", "a", "b"]).unwrap();
        assert!(matches!(cli.command, Commands::Forget { ids, .. } if ids == ["a", "b"]));
    }

    #[test]
    fn config_flag_is_global() {
        let cli =
            Cli::try_parse_from(["reverie", "stats", "c", "--config", "/tmp/r.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/r.toml")));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config =
            reverie_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.memory.tokenizer, "cl100k_base");
    }
}
