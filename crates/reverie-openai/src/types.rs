// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request/response types for the OpenAI-compatible embeddings and chat APIs.

use serde::{Deserialize, Serialize};

// --- Embeddings ---

/// Body of `POST /embeddings`.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
    /// Output dimensionality for models that support shortening.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
    #[serde(default)]
    pub model: Option<String>,
}

/// One vector of an embeddings response; `index` refers to the input position.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    pub index: usize,
    pub embedding: Vec<f32>,
}

// --- Chat completions ---

/// Body of `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatCompletionMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
        }
    }
}

/// Requested output format, e.g. `json_object`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatCompletionMessage,
}

// --- Errors ---

/// Error envelope returned by OpenAI-compatible servers.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_request_omits_unset_dimensions() {
        let req = EmbeddingRequest {
            model: "m".into(),
            input: vec!["a".into()],
            dimensions: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("dimensions").is_none());
        assert_eq!(json["input"][0], "a");
    }

    #[test]
    fn chat_request_serializes_response_format() {
        let req = ChatCompletionRequest {
            model: "m".into(),
            messages: vec![ChatCompletionMessage::new("user", "hi")],
            max_tokens: 10,
            temperature: Some(0.2),
            response_format: Some(ResponseFormat::json_object()),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn error_type_is_optional() {
        let err: ApiErrorResponse =
            serde_json::from_str(r#"{"error": {"message": "model not found"}}"#).unwrap();
        assert_eq!(err.error.message, "model not found");
        assert!(err.error.type_.is_none());
    }
}
