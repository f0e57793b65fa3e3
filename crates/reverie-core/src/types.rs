// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Reverie memory engine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Default importance assigned when enrichment does not provide one.
pub const DEFAULT_IMPORTANCE: u8 = 5;

/// Upper bound on stored tags per scene.
const MAX_TAGS: usize = 12;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Embedding,
    Enrichment,
}

// --- Conversation types ---

/// Speaker role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ChatRole {
    User,
    Model,
    System,
}

impl ChatRole {
    /// Label used when a turn is rendered as role-prefixed text.
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "User",
            ChatRole::Model => "Model",
            ChatRole::System => "System",
        }
    }
}

/// A single conversation message handed to the memory engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Identifier of the message in the conversation store.
    pub id: String,
    /// Who sent it.
    pub role: ChatRole,
    /// Raw message text, possibly containing per-turn instructions.
    pub content: String,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
        }
    }
}

// --- Embedding types ---

/// Whether text is embedded as a search query or as a stored document.
///
/// Asymmetric embedding models use different instruction prefixes per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmbeddingRole {
    Query,
    Document,
}

/// Input for an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    /// Texts to embed; the output carries one vector per entry, in order.
    pub texts: Vec<String>,
    /// Query or document embedding.
    pub role: EmbeddingRole,
    /// Model override for this request. `None` uses the adapter default.
    pub model: Option<String>,
    /// Requested output dimensionality for models that support truncation.
    pub dimensions: Option<usize>,
    /// Per-request API key. `None` uses the adapter's configured key.
    pub api_key: Option<String>,
}

impl EmbeddingInput {
    /// Input using the adapter's defaults.
    pub fn new(texts: Vec<String>, role: EmbeddingRole) -> Self {
        Self {
            texts,
            role,
            model: None,
            dimensions: None,
            api_key: None,
        }
    }
}

/// Output from an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// One vector per input text.
    pub embeddings: Vec<Vec<f32>>,
    /// Dimensionality shared by every vector in `embeddings`.
    pub dimensions: usize,
}

// --- Enrichment types ---

/// A directed relation between two entities mentioned in a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub relation: String,
    pub target: String,
}

/// Structured scene metadata derived from a conversation turn.
///
/// Every field has a defined default so downstream code never deals
/// with partially-shaped enrichment payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneEnrichment {
    /// Short synopsis of the scene.
    #[serde(default)]
    pub summary: String,
    /// Topical tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Importance on a 1-10 scale.
    #[serde(default = "default_importance")]
    pub importance: u8,
    /// Entity relations mentioned in the scene.
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// Dominant mood, if any.
    #[serde(default)]
    pub mood: Option<String>,
}

fn default_importance() -> u8 {
    DEFAULT_IMPORTANCE
}

impl Default for SceneEnrichment {
    fn default() -> Self {
        Self {
            summary: String::new(),
            tags: Vec::new(),
            importance: DEFAULT_IMPORTANCE,
            relations: Vec::new(),
            mood: None,
        }
    }
}

impl SceneEnrichment {
    /// Enrichment used when the backend fails: a truncated copy of the text as summary.
    pub fn fallback(text: &str, summary_chars: usize) -> Self {
        let summary: String = text.trim().chars().take(summary_chars).collect();
        Self {
            summary,
            ..Self::default()
        }
    }

    /// Parse and validate an LLM enrichment response.
    ///
    /// Accepts a bare JSON object, one wrapped in a markdown code block, or one
    /// surrounded by prose. Returns `None` if no JSON object can be decoded.
    pub fn from_llm_response(response: &str) -> Option<Self> {
        let trimmed = response.trim();
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end < start {
            return None;
        }
        let value: serde_json::Value = serde_json::from_str(&trimmed[start..=end]).ok()?;
        Self::from_value(&value)
    }

    /// Normalize a loosely-typed JSON payload into an enrichment record.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;

        let summary = obj
            .get("summary")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let mut tags: Vec<String> = Vec::new();
        match obj.get("tags") {
            Some(serde_json::Value::Array(items)) => {
                for item in items {
                    if let Some(tag) = item.as_str() {
                        push_tag(&mut tags, tag);
                    }
                }
            }
            Some(serde_json::Value::String(joined)) => {
                for tag in joined.split(',') {
                    push_tag(&mut tags, tag);
                }
            }
            _ => {}
        }

        let importance = obj
            .get("importance")
            .and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .filter(|n| n.is_finite())
            .map(|n| n.round().clamp(1.0, 10.0) as u8)
            .unwrap_or(DEFAULT_IMPORTANCE);

        let relations = obj
            .get("relations")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(parse_relation).collect())
            .unwrap_or_default();

        let mood = obj
            .get("mood")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Some(Self {
            summary,
            tags,
            importance,
            relations,
            mood,
        })
    }
}

fn push_tag(tags: &mut Vec<String>, raw: &str) {
    let tag = raw.trim();
    if tag.is_empty() || tags.len() >= MAX_TAGS {
        return;
    }
    if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
        tags.push(tag.to_string());
    }
}

fn parse_relation(value: &serde_json::Value) -> Option<Relation> {
    let obj = value.as_object()?;
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| obj.get(*n).and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Some(Relation {
        source: field(&["source", "subject", "from"])?,
        relation: field(&["relation", "predicate", "type"])?,
        target: field(&["target", "object", "to"])?,
    })
}
