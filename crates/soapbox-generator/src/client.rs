// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the generative text provider API.
//!
//! Provides [`ProviderClient`] which handles request construction,
//! authentication, bounded timeouts, and failure classification. Retrying is
//! NOT done here: the orchestrator owns the retry decision, so this client
//! reports exactly one classified outcome per call.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use soapbox_core::{GenerateFailure, ProviderRequest, ProviderResponse, SoapboxError, TextProvider};
use tracing::debug;

/// Error body returned by the provider API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// HTTP client for text provider communication.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ProviderClient {
    /// Creates a new provider API client.
    ///
    /// # Arguments
    /// * `base_url` - API base URL without trailing slash
    /// * `api_key` - bearer credential for authentication
    /// * `timeout` - per-request deadline
    pub fn new(
        base_url: String,
        api_key: &SecretString,
        timeout: Duration,
    ) -> Result<Self, SoapboxError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|e| SoapboxError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SoapboxError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn classify_transport(&self, err: reqwest::Error) -> GenerateFailure {
        if err.is_timeout() {
            GenerateFailure::ProviderTimeout(self.timeout)
        } else {
            GenerateFailure::Transient(format!("request failed: {err}"))
        }
    }
}

/// Map a non-success provider response to a failure kind.
///
/// 429 is rate limiting, 401/403 a credential problem, and a 400 carrying
/// the provider's policy code a content rejection. Anything else -- 5xx and
/// unrecognized statuses -- is treated as transient and left to the
/// orchestrator's bounded retry budget.
fn classify_status(status: reqwest::StatusCode, body: &str) -> GenerateFailure {
    let (code, message) = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => (parsed.error.code, parsed.error.message),
        Err(_) => (None, format!("provider returned {status}")),
    };
    match status.as_u16() {
        429 => GenerateFailure::RateLimited(message),
        401 | 403 => GenerateFailure::InvalidCredential(message),
        400 if code.as_deref() == Some("content_policy_violation") => {
            GenerateFailure::ContentPolicyRejected(message)
        }
        _ => GenerateFailure::Transient(message),
    }
}

#[async_trait::async_trait]
impl TextProvider for ProviderClient {
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, GenerateFailure> {
        let url = format!("{}/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        debug!(status = %status, model = %request.model, "provider response received");

        let body = response
            .text()
            .await
            .map_err(|e| GenerateFailure::Transient(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        serde_json::from_str::<ProviderResponse>(&body)
            .map_err(|e| GenerateFailure::Transient(format!("failed to parse response: {e}")))
    }

    async fn probe(&self) -> Result<(), GenerateFailure> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> ProviderClient {
        ProviderClient::new(
            base_url.to_string(),
            &SecretString::from("test-api-key".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn test_request() -> ProviderRequest {
        ProviderRequest {
            prompt: "Write a post about launch day".into(),
            model: "textsmith-mini".into(),
            temperature: 0.7,
            max_output_length: 500,
        }
    }

    #[tokio::test]
    async fn complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "Ship it!"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.complete(test_request()).await.unwrap();
        assert_eq!(result.text, "Ship it!");
    }

    #[tokio::test]
    async fn complete_classifies_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": "rate_limit_exceeded", "message": "slow down"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, GenerateFailure::RateLimited(_)), "got: {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn complete_classifies_bad_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "invalid api key"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, GenerateFailure::InvalidCredential(_)), "got: {err:?}");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn complete_classifies_policy_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": "content_policy_violation", "message": "prompt flagged"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete(test_request()).await.unwrap_err();
        assert!(
            matches!(err, GenerateFailure::ContentPolicyRejected(_)),
            "got: {err:?}"
        );
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn complete_classifies_server_error_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, GenerateFailure::Transient(_)), "got: {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn complete_classifies_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "late"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = ProviderClient::new(
            server.uri(),
            &SecretString::from("test-api-key".to_string()),
            Duration::from_millis(100),
        )
        .unwrap();
        let err = client.complete(test_request()).await.unwrap_err();
        assert!(matches!(err, GenerateFailure::ProviderTimeout(_)), "got: {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn probe_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.probe().await.is_ok());
    }
}
