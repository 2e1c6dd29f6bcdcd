// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish orchestration: credential resolution, local capability checks,
//! the idempotency guard, and credential-scrubbed error reporting.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use soapbox_core::{Channel, ChannelApi, PublishFailure, PublishReceipt};
use tracing::{info, warn};

use crate::redact;

/// Publishes content to a channel through its API adapter.
///
/// Publishing is deliberately NOT memoized -- a duplicate submit must be
/// prevented by the remote-side lookup, not hidden by a cache.
pub struct ChannelPublisher {
    api: Arc<dyn ChannelApi>,
}

impl ChannelPublisher {
    pub fn new(api: Arc<dyn ChannelApi>) -> Self {
        Self { api }
    }

    /// Publish `content` for the post identified by `client_ref`.
    ///
    /// Order of checks:
    /// 1. credential present (fail fast, non-retryable)
    /// 2. channel length cap (fail fast, non-retryable, no network call)
    /// 3. idempotency guard: look up `client_ref` remotely; an existing post
    ///    short-circuits with its id, so duplicate deliveries never create a
    ///    second remote post
    /// 4. submit
    pub async fn publish(
        &self,
        channel: &Channel,
        content: &str,
        client_ref: &str,
    ) -> Result<PublishReceipt, PublishFailure> {
        let credential = resolve_credential(channel)?;

        if let Some(cap) = channel.max_content_len {
            let len = content.chars().count();
            if len > cap {
                return Err(PublishFailure::ContentRejected(format!(
                    "content length {len} exceeds channel cap {cap}"
                )));
            }
        }

        match self
            .api
            .find_post(credential, &channel.remote_page_id, client_ref)
            .await
        {
            Ok(Some(existing)) => {
                warn!(
                    channel = %channel.id.0,
                    client_ref,
                    remote_post_id = %existing,
                    "prior submission found, skipping duplicate publish"
                );
                return Ok(PublishReceipt {
                    remote_post_id: existing,
                    already_published: true,
                });
            }
            Ok(None) => {}
            Err(err) => return Err(scrub_failure(err, credential)),
        }

        match self
            .api
            .create_post(credential, &channel.remote_page_id, content, client_ref)
            .await
        {
            Ok(remote_post_id) => {
                info!(
                    channel = %channel.id.0,
                    client_ref,
                    remote_post_id = %remote_post_id,
                    "post published"
                );
                Ok(PublishReceipt {
                    remote_post_id,
                    already_published: false,
                })
            }
            Err(err) => Err(scrub_failure(err, credential)),
        }
    }

    /// Probe the channel's credential against the remote API.
    pub async fn verify_credential(&self, channel: &Channel) -> Result<(), PublishFailure> {
        let credential = resolve_credential(channel)?;
        self.api
            .verify_credential(credential)
            .await
            .map_err(|err| scrub_failure(err, credential))
    }
}

/// Resolve the channel's credential, failing fast when absent or empty.
fn resolve_credential(channel: &Channel) -> Result<&SecretString, PublishFailure> {
    channel
        .credential
        .as_ref()
        .filter(|c| !c.expose_secret().is_empty())
        .ok_or_else(|| {
            PublishFailure::InvalidCredential(format!(
                "channel {} has no credential configured",
                channel.id.0
            ))
        })
}

/// Scrub the credential out of a failure's message before it can reach a
/// log line or the post's `last_error` column.
fn scrub_failure(failure: PublishFailure, credential: &SecretString) -> PublishFailure {
    let secrets = [credential];
    match failure {
        PublishFailure::InvalidCredential(m) => {
            PublishFailure::InvalidCredential(redact::scrub(&m, &secrets))
        }
        PublishFailure::ChannelRateLimited(m) => {
            PublishFailure::ChannelRateLimited(redact::scrub(&m, &secrets))
        }
        PublishFailure::ContentRejected(m) => {
            PublishFailure::ContentRejected(redact::scrub(&m, &secrets))
        }
        PublishFailure::Transient(m) => PublishFailure::Transient(redact::scrub(&m, &secrets)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soapbox_core::ChannelId;
    use soapbox_test_utils::MockChannel;

    fn channel(credential: Option<&str>) -> Channel {
        Channel {
            id: ChannelId("ch-1".into()),
            name: "Page".into(),
            remote_page_id: "9001".into(),
            credential: credential.map(|c| SecretString::from(c.to_string())),
            max_content_len: Some(100),
            active: true,
        }
    }

    #[tokio::test]
    async fn missing_credential_fails_fast_without_api_call() {
        let api = Arc::new(MockChannel::new());
        let publisher = ChannelPublisher::new(Arc::clone(&api) as Arc<dyn ChannelApi>);

        let err = publisher
            .publish(&channel(None), "Hello", "post-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishFailure::InvalidCredential(_)));
        assert_eq!(api.create_count(), 0);
        assert_eq!(api.find_count(), 0);
    }

    #[tokio::test]
    async fn empty_credential_counts_as_missing() {
        let api = Arc::new(MockChannel::new());
        let publisher = ChannelPublisher::new(Arc::clone(&api) as Arc<dyn ChannelApi>);

        let err = publisher
            .publish(&channel(Some("")), "Hello", "post-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishFailure::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn over_cap_content_is_rejected_locally() {
        let api = Arc::new(MockChannel::new());
        let publisher = ChannelPublisher::new(Arc::clone(&api) as Arc<dyn ChannelApi>);

        let long_content = "x".repeat(101);
        let err = publisher
            .publish(&channel(Some("token")), &long_content, "post-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishFailure::ContentRejected(_)));
        assert_eq!(api.create_count(), 0, "no network call for local rejection");
    }

    #[tokio::test]
    async fn publish_returns_fresh_receipt() {
        let api = Arc::new(MockChannel::new());
        let publisher = ChannelPublisher::new(Arc::clone(&api) as Arc<dyn ChannelApi>);

        let receipt = publisher
            .publish(&channel(Some("token")), "Hello!", "post-1")
            .await
            .unwrap();
        assert!(!receipt.already_published);
        assert!(!receipt.remote_post_id.is_empty());

        let created = api.created_posts();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].content, "Hello!");
        assert_eq!(created[0].client_ref, "post-1");
    }

    #[tokio::test]
    async fn duplicate_delivery_publishes_exactly_once() {
        let api = Arc::new(MockChannel::new());
        let publisher = ChannelPublisher::new(Arc::clone(&api) as Arc<dyn ChannelApi>);
        let channel = channel(Some("token"));

        let first = publisher.publish(&channel, "Hello!", "post-1").await.unwrap();
        let second = publisher.publish(&channel, "Hello!", "post-1").await.unwrap();

        assert_eq!(first.remote_post_id, second.remote_post_id);
        assert!(!first.already_published);
        assert!(second.already_published);
        assert_eq!(api.create_count(), 1, "one remote post despite two deliveries");
    }

    #[tokio::test]
    async fn classified_failures_pass_through() {
        let api = Arc::new(MockChannel::new());
        api.push_create_failure(PublishFailure::ChannelRateLimited("slow down".into()));
        let publisher = ChannelPublisher::new(Arc::clone(&api) as Arc<dyn ChannelApi>);

        let err = publisher
            .publish(&channel(Some("token")), "Hello!", "post-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishFailure::ChannelRateLimited(_)));
    }

    #[tokio::test]
    async fn error_text_never_contains_the_credential() {
        let api = Arc::new(MockChannel::new());
        api.push_create_failure(PublishFailure::InvalidCredential(
            "API rejected token super-secret-token as malformed".into(),
        ));
        let publisher = ChannelPublisher::new(Arc::clone(&api) as Arc<dyn ChannelApi>);

        let err = publisher
            .publish(&channel(Some("super-secret-token")), "Hello!", "post-1")
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(!text.contains("super-secret-token"), "got: {text}");
        assert!(text.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn lookup_failure_propagates_without_submitting() {
        let api = Arc::new(MockChannel::new());
        api.push_find_failure(PublishFailure::Transient("lookup down".into()));
        let publisher = ChannelPublisher::new(Arc::clone(&api) as Arc<dyn ChannelApi>);

        let err = publisher
            .publish(&channel(Some("token")), "Hello!", "post-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishFailure::Transient(_)));
        assert_eq!(api.create_count(), 0, "no blind submit when the guard cannot run");
    }

    #[tokio::test]
    async fn verify_credential_delegates_to_api() {
        let api = Arc::new(MockChannel::new());
        let publisher = ChannelPublisher::new(Arc::clone(&api) as Arc<dyn ChannelApi>);
        assert!(publisher.verify_credential(&channel(Some("token"))).await.is_ok());

        api.set_verify_failure(PublishFailure::InvalidCredential("expired".into()));
        let err = publisher
            .verify_credential(&channel(Some("token")))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishFailure::InvalidCredential(_)));
    }
}
