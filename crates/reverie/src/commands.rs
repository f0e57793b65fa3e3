// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory subcommands: wiring the service over SQLite and the HTTP backends.

use std::path::Path;
use std::sync::Arc;

use reverie_config::{EmbeddingConfig, ReverieConfig};
use reverie_core::{ChatMessage, ChatRole, EnrichmentAdapter, ReverieError, StorageAdapter};
use reverie_memory::{IndexRegistry, Memory, MemoryService, SceneEnricher, TiktokenCounter};
use reverie_openai::{OpenAiEmbedder, OpenAiEnricher};
use reverie_storage::SqliteStorage;
use tracing::{debug, info};

use crate::Commands;

/// A memory service over the configured database and backends.
pub struct Runtime {
    pub service: MemoryService,
    storage: Arc<SqliteStorage>,
    embedding: EmbeddingConfig,
}

impl Runtime {
    pub async fn open(config: &ReverieConfig) -> Result<Self, ReverieError> {
        if let Some(parent) = Path::new(&config.storage.database_path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ReverieError::storage)?;
        }

        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let embedder = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
        let tokenizer = Arc::new(TiktokenCounter::from_name(&config.memory.tokenizer)?);
        let mut service = MemoryService::new(
            storage.clone(),
            Arc::new(IndexRegistry::new()),
            embedder,
            tokenizer,
            config.memory.clone(),
        );

        if config.enrichment.enabled {
            let enricher: Arc<dyn EnrichmentAdapter> =
                Arc::new(OpenAiEnricher::new(&config.enrichment)?);
            service = service.with_enricher(SceneEnricher::new(
                Some(enricher),
                config.memory.max_facts,
            ));
        } else {
            debug!("scene enrichment disabled");
        }

        let mut embedding = config.embedding.clone();
        embedding.api_key = reverie_openai::resolve_api_key(embedding.api_key.as_deref());

        info!(database = %config.storage.database_path, "memory runtime ready");
        Ok(Self {
            service,
            storage,
            embedding,
        })
    }

    pub async fn close(self) -> Result<(), ReverieError> {
        self.storage.close().await
    }
}

/// Run one memory subcommand and close the database afterwards.
pub async fn run(command: Commands, config: &ReverieConfig) -> Result<(), ReverieError> {
    let runtime = Runtime::open(config).await?;
    let result = execute(&runtime, command).await;
    runtime.close().await?;
    result
}

async fn execute(runtime: &Runtime, command: Commands) -> Result<(), ReverieError> {
    let service = &runtime.service;
    let embedding = &runtime.embedding;

    match command {
        Commands::Ingest {
            collection,
            file,
            chunk_size,
        } => {
            let messages = read_turn(&file).await?;
            let created = service
                .add_messages_to_collection(
                    &collection,
                    &messages,
                    embedding,
                    chunk_size.unwrap_or(0),
                )
                .await?;
            println!("{created} memories created in {collection}");
        }
        Commands::Remember { collection, text } => {
            match service.add_memory(&collection, &text, embedding).await? {
                Some(id) => println!("{id}"),
                None => println!("nothing stored"),
            }
        }
        Commands::Search {
            collection,
            query,
            k,
            budget,
            context,
        } => {
            let active = match context {
                Some(path) => read_context(&path).await?,
                None => Vec::new(),
            };
            let memories = service
                .search_relevant_memories(
                    &collection,
                    &query,
                    embedding,
                    &active,
                    k.unwrap_or(service.config().top_k),
                    budget.unwrap_or(service.config().token_budget),
                )
                .await;
            print_json(&memories)?;
        }
        Commands::List { collection } => {
            let memories = service.get_all_memories(&collection).await?;
            for memory in &memories {
                println!("{}", list_line(memory));
            }
        }
        Commands::Stats { collection } => {
            let stats = service.collection_stats(&collection).await?;
            print_json(&stats)?;
        }
        Commands::Forget { collection, ids } => {
            let removed = service.delete_memories(&collection, &ids).await?;
            println!("{removed} memories deleted from {collection}");
        }
        Commands::Drop { collection } => {
            let removed = service.delete_collection(&collection).await?;
            println!("collection {collection} dropped ({removed} memories)");
        }
        Commands::Doctor { .. } => {
            return Err(ReverieError::Internal("doctor does not open the memory runtime".into()));
        }
    }
    Ok(())
}

async fn read_turn(path: &Path) -> Result<Vec<ChatMessage>, ReverieError> {
    let content = read_input(path).await?;
    parse_turn(&content).map_err(|e| {
        ReverieError::Config(format!("invalid turn file {}: {e}", path.display()))
    })
}

async fn read_context(path: &Path) -> Result<Vec<ChatMessage>, ReverieError> {
    let content = read_input(path).await?;
    parse_context(&content)
        .map_err(|e| ReverieError::Config(format!("invalid context file {}: {e}", path.display())))
}

async fn read_input(path: &Path) -> Result<String, ReverieError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ReverieError::Config(format!("cannot read {}: {e}", path.display())))
}

fn parse_turn(content: &str) -> Result<Vec<ChatMessage>, serde_json::Error> {
    serde_json::from_str(content)
}

/// Active context is identified by message id only.
fn parse_context(content: &str) -> Result<Vec<ChatMessage>, serde_json::Error> {
    let ids: Vec<String> = serde_json::from_str(content)?;
    Ok(ids
        .into_iter()
        .map(|id| ChatMessage::new(id, ChatRole::User, ""))
        .collect())
}

fn list_line(memory: &Memory) -> String {
    let summary: String = memory.summary.chars().take(80).collect();
    format!(
        "{}  {}  imp={:<2} [{}]  {}",
        memory.id,
        memory.timestamp,
        memory.importance,
        memory.tags.join(","),
        summary
    )
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ReverieError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| ReverieError::Internal(format!("failed to render output: {e}")))?;
    println!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_file_is_a_message_array() {
        let messages = parse_turn(
            r#"[{"id": "u1", "role": "user", "content": "Hello"},
                {"id": "m1", "role": "model", "content": "Hi there"}]"#,
        )
        .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, ChatRole::Model);
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(parse_turn(r#"[{"id": "x", "role": "narrator", "content": "?"}]"#).is_err());
    }

    #[test]
    fn context_file_is_an_id_array() {
        let active = parse_context(r#"["u1", "m1"]"#).unwrap();
        let ids: Vec<_> = active.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["u1", "m1"]);
    }

    #[test]
    fn list_line_truncates_summary() {
        let memory = Memory {
            id: "abc".into(),
            source_message_ids: Vec::new(),
            timestamp: 42,
            full_text: String::new(),
            summary: "x".repeat(200),
            sanitized_facts: Vec::new(),
            tags: vec!["harbor".into(), "boats".into()],
            importance: 7,
            mood: None,
            relations: Vec::new(),
            previous_memory_id: None,
            next_memory_id: None,
        };
        let line = list_line(&memory);
        assert!(line.starts_with("abc  42  imp=7 "));
        assert!(line.contains("[harbor,boats]"));
        assert!(line.ends_with(&"x".repeat(80)));
    }
}
