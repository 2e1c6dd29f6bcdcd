// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the publishing API.
//!
//! The wire contract: `POST /{page_id}/feed` submits content and returns the
//! remote post id; `GET /{page_id}/posts?client_ref=..` is the read
//! operation backing the idempotency guard; `GET /me` validates a
//! credential. Authentication is a per-request bearer header, because every
//! channel carries its own credential.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use soapbox_core::{ChannelApi, PublishFailure, SoapboxError};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PostListResponse {
    #[serde(default)]
    data: Vec<PostListEntry>,
}

#[derive(Debug, Deserialize)]
struct PostListEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// HTTP client for the publishing API.
#[derive(Debug, Clone)]
pub struct HttpChannelApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChannelApi {
    /// Creates a new publishing API client with a bounded per-request timeout.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, SoapboxError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SoapboxError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn classify_transport(err: reqwest::Error) -> PublishFailure {
    // Timeouts are transient by contract: the submit may or may not have
    // landed, which is exactly what the idempotency guard exists for.
    PublishFailure::Transient(format!("request failed: {err}"))
}

/// Map a non-success publishing API response to a failure kind.
fn classify_status(status: StatusCode, body: &str) -> PublishFailure {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => format!("channel API returned {status}"),
    };
    match status.as_u16() {
        401 | 403 => PublishFailure::InvalidCredential(message),
        429 => PublishFailure::ChannelRateLimited(message),
        400 | 422 => PublishFailure::ContentRejected(message),
        _ => PublishFailure::Transient(message),
    }
}

#[async_trait::async_trait]
impl ChannelApi for HttpChannelApi {
    async fn create_post(
        &self,
        credential: &SecretString,
        remote_page_id: &str,
        content: &str,
        client_ref: &str,
    ) -> Result<String, PublishFailure> {
        let url = format!("{}/{}/feed", self.base_url, remote_page_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.expose_secret())
            .json(&serde_json::json!({
                "message": content,
                "client_ref": client_ref,
            }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        debug!(status = %status, page = remote_page_id, "create post response");
        let body = response
            .text()
            .await
            .map_err(|e| PublishFailure::Transient(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        serde_json::from_str::<CreatePostResponse>(&body)
            .map(|r| r.id)
            .map_err(|e| PublishFailure::Transient(format!("failed to parse response: {e}")))
    }

    async fn find_post(
        &self,
        credential: &SecretString,
        remote_page_id: &str,
        client_ref: &str,
    ) -> Result<Option<String>, PublishFailure> {
        let url = format!("{}/{}/posts", self.base_url, remote_page_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.expose_secret())
            .query(&[("client_ref", client_ref)])
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishFailure::Transient(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let list = serde_json::from_str::<PostListResponse>(&body)
            .map_err(|e| PublishFailure::Transient(format!("failed to parse response: {e}")))?;
        Ok(list.data.into_iter().next().map(|entry| entry.id))
    }

    async fn verify_credential(&self, credential: &SecretString) -> Result<(), PublishFailure> {
        let url = format!("{}/me", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.expose_secret())
            .send()
            .await
            .map_err(classify_transport)?;

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
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential() -> SecretString {
        SecretString::from("page-token".to_string())
    }

    fn test_client(base_url: &str) -> HttpChannelApi {
        HttpChannelApi::new(base_url.to_string(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn create_post_returns_remote_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/9001/feed"))
            .and(header("authorization", "Bearer page-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "9001_777"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let id = client
            .create_post(&credential(), "9001", "Hello!", "post-1")
            .await
            .unwrap();
        assert_eq!(id, "9001_777");
    }

    #[tokio::test]
    async fn find_post_resolves_existing_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/9001/posts"))
            .and(query_param("client_ref", "post-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "9001_777"}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let found = client
            .find_post(&credential(), "9001", "post-1")
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("9001_777"));
    }

    #[tokio::test]
    async fn find_post_empty_list_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/9001/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let found = client
            .find_post(&credential(), "9001", "post-404")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn expired_credential_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/9001/feed"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "token expired"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .create_post(&credential(), "9001", "Hello!", "post-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishFailure::InvalidCredential(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn throttling_is_classified_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/9001/feed"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "too many posts"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .create_post(&credential(), "9001", "Hello!", "post-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishFailure::ChannelRateLimited(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn content_rejection_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/9001/feed"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "message violates community standards"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .create_post(&credential(), "9001", "Hello!", "post-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishFailure::ContentRejected(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/9001/feed"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .create_post(&credential(), "9001", "Hello!", "post-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishFailure::Transient(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn verify_credential_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bearer page-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "42"})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.verify_credential(&credential()).await.is_ok());
    }
}
