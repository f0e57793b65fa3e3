// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding gateway over `POST /embeddings`.

use std::time::Duration;

use async_trait::async_trait;
use reverie_config::EmbeddingConfig;
use reverie_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use reverie_core::{EmbeddingAdapter, PluginAdapter, ReverieError};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::resolve_api_key;
use crate::types::{EmbeddingRequest, EmbeddingResponse};

/// Embedding adapter for OpenAI-compatible servers.
///
/// The embedding role is accepted but not forwarded: the OpenAI API has no
/// query/document distinction.
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    dimensions: Option<usize>,
    requires_key: bool,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, ReverieError> {
        let api_key = resolve_api_key(config.api_key.as_deref());
        let client = OpenAiClient::new(
            &config.base_url,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(
            provider = %config.provider,
            model = %config.model,
            base_url = %client.base_url(),
            "embedding gateway initialized"
        );
        Ok(Self {
            client,
            model: config.model.clone(),
            dimensions: config.dimensions,
            requires_key: config.requires_api_key(),
        })
    }

    /// Creates an embedder with an existing client (for testing).
    pub fn with_client(client: OpenAiClient, model: &str, dimensions: Option<usize>) -> Self {
        Self {
            requires_key: client.has_api_key(),
            client,
            model: model.to_string(),
            dimensions,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai-embedding"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, ReverieError> {
        if self.requires_key && !self.client.has_api_key() {
            return Ok(HealthStatus::Unhealthy("no API key configured".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ReverieError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, ReverieError> {
        if input.texts.is_empty() {
            return Ok(EmbeddingOutput {
                embeddings: Vec::new(),
                dimensions: input.dimensions.or(self.dimensions).unwrap_or(0),
            });
        }
        if self.requires_key && input.api_key.is_none() && !self.client.has_api_key() {
            return Err(ReverieError::Config(
                "embedding API key is not configured".into(),
            ));
        }

        let expected = input.texts.len();
        let request = EmbeddingRequest {
            model: input.model.unwrap_or_else(|| self.model.clone()),
            input: input.texts,
            dimensions: input.dimensions.or(self.dimensions),
        };
        let response: EmbeddingResponse = self
            .client
            .post_json("/embeddings", &request, input.api_key.as_deref())
            .await?;

        let output = collect_embeddings(response, expected)?;
        debug!(
            model = %request.model,
            count = output.embeddings.len(),
            dims = output.dimensions,
            role = %input.role,
            "texts embedded"
        );
        Ok(output)
    }
}

/// Order vectors by input position and check they cover every input once.
fn collect_embeddings(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<EmbeddingOutput, ReverieError> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(ReverieError::Contract(format!(
            "{expected} texts but {} embeddings",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    if data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(ReverieError::Contract(
            "embedding indices do not match inputs".into(),
        ));
    }

    let dimensions = data.first().map_or(0, |d| d.embedding.len());
    if dimensions == 0 || data.iter().any(|d| d.embedding.len() != dimensions) {
        return Err(ReverieError::Contract(
            "embeddings in one response differ in dimension".into(),
        ));
    }

    Ok(EmbeddingOutput {
        embeddings: data.into_iter().map(|d| d.embedding).collect(),
        dimensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DEFAULT_BASE_URL;
    use reverie_core::types::EmbeddingRole;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer) -> OpenAiEmbedder {
        let client =
            OpenAiClient::new(DEFAULT_BASE_URL, Some("sk-test".into()), Duration::from_secs(5))
                .unwrap()
                .with_base_url(&server.uri());
        OpenAiEmbedder::with_client(client, "text-embedding-3-small", None)
    }

    fn input(texts: &[&str]) -> EmbeddingInput {
        EmbeddingInput::new(texts.iter().map(|t| t.to_string()).collect(), EmbeddingRole::Document)
    }

    #[tokio::test]
    async fn reorders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": ["first", "second"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0, 0.0]},
                    {"index": 0, "embedding": [1.0, 0.0, 0.0]}
                ],
                "model": "text-embedding-3-small"
            })))
            .mount(&server)
            .await;

        let out = embedder(&server).embed(input(&["first", "second"])).await.unwrap();
        assert_eq!(out.dimensions, 3);
        assert_eq!(out.embeddings[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(out.embeddings[1], vec![0.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn forwards_requested_dimensions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"dimensions": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [0.5, 0.5]}]
            })))
            .mount(&server)
            .await;

        let mut req = input(&["x"]);
        req.dimensions = Some(2);
        let out = embedder(&server).embed(req).await.unwrap();
        assert_eq!(out.dimensions, 2);
    }

    #[tokio::test]
    async fn short_response_is_contract_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let err = embedder(&server).embed(input(&["a", "b"])).await.unwrap_err();
        assert!(err.is_contract());
    }

    #[tokio::test]
    async fn ragged_response_is_contract_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 0, "embedding": [1.0, 0.0]},
                    {"index": 1, "embedding": [1.0]}
                ]
            })))
            .mount(&server)
            .await;

        let err = embedder(&server).embed(input(&["a", "b"])).await.unwrap_err();
        assert!(err.is_contract());
    }

    #[tokio::test]
    async fn missing_key_is_configuration_error() {
        let client = OpenAiClient::new(DEFAULT_BASE_URL, None, Duration::from_secs(5)).unwrap();
        let embedder = OpenAiEmbedder {
            client,
            model: "m".into(),
            dimensions: None,
            requires_key: true,
        };
        let err = embedder.embed(input(&["a"])).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(
            embedder.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }
}
