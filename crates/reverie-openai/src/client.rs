// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible APIs.
//!
//! Provides [`OpenAiClient`] which handles request construction, bearer
//! authentication and transient error retry. Local servers (Ollama, llama.cpp)
//! that speak the same protocol work without an API key.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reverie_core::ReverieError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::types::ApiErrorResponse;

/// Default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP client for one OpenAI-compatible server.
///
/// Retries once on transient errors (429, 500, 503) after a one second delay.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiClient {
    /// Creates a client for `base_url` (for example `https://api.openai.com/v1`).
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ReverieError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ReverieError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
            max_retries: 1,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// POST `body` as JSON to `{base_url}{path}` and decode the JSON response.
    ///
    /// `api_key` overrides the client's key for this request.
    pub async fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        api_key: Option<&str>,
    ) -> Result<Resp, ReverieError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let key = api_key.or(self.api_key.as_deref());
        let auth = key
            .map(|k| {
                HeaderValue::from_str(&format!("Bearer {k}"))
                    .map_err(|e| ReverieError::Config(format!("invalid API key header value: {e}")))
            })
            .transpose()?;

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, path, "retrying request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let mut request = self.client.post(&url).json(body);
            if let Some(auth) = auth.clone() {
                request = request.header(AUTHORIZATION, auth);
            }
            let response = request.send().await.map_err(|e| self.request_error(e))?;

            let status = response.status();
            debug!(status = %status, attempt, path, "response received");

            if status.is_success() {
                let text = response.text().await.map_err(|e| ReverieError::Provider {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return serde_json::from_str(&text).map_err(|e| ReverieError::Provider {
                    message: format!("failed to parse API response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(ReverieError::Provider {
                    message: format!("API returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            // Non-transient error or exhausted retries.
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "API error ({}): {}",
                    api_err.error.type_.as_deref().unwrap_or(status.as_str()),
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(ReverieError::Provider {
                message,
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| ReverieError::Provider {
            message: "request failed after retries".into(),
            source: None,
        }))
    }

    fn request_error(&self, e: reqwest::Error) -> ReverieError {
        if e.is_timeout() {
            return ReverieError::Timeout {
                duration: self.timeout,
            };
        }
        ReverieError::Provider {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str, key: Option<&str>) -> OpenAiClient {
        OpenAiClient::new(DEFAULT_BASE_URL, key.map(String::from), Duration::from_secs(5))
            .unwrap()
            .with_base_url(base_url)
    }

    #[tokio::test]
    async fn sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Some("sk-test"));
        let out: serde_json::Value = client
            .post_json("/echo", &serde_json::json!({}), None)
            .await
            .unwrap();
        assert_eq!(out["ok"], true);
    }

    #[tokio::test]
    async fn per_request_key_overrides_client_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-override"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Some("sk-test"));
        let out: Result<serde_json::Value, _> = client
            .post_json("/x", &serde_json::json!({}), Some("sk-override"))
            .await;
        assert!(out.is_ok());
    }

    #[tokio::test]
    async fn retries_once_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "slow down", "type": "rate_limit"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"n": 2})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), None);
        let out: serde_json::Value = client
            .post_json("/x", &serde_json::json!({}), None)
            .await
            .unwrap();
        assert_eq!(out["n"], 2);
    }

    #[tokio::test]
    async fn exhausts_retries_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"message": "overloaded", "type": "server_error"}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), None);
        let err = client
            .post_json::<_, serde_json::Value>("/x", &serde_json::json!({}), None)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("server_error"), "got: {err}");
    }

    #[tokio::test]
    async fn fails_fast_on_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), None);
        let err = client
            .post_json::<_, serde_json::Value>("/x", &serde_json::json!({}), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"), "got: {err}");
    }
}
