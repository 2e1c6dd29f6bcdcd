// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Soapbox post automation pipeline.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Soapbox workspace: the scheduled-post
//! lifecycle model, the failure classification that drives retry decisions,
//! and the provider/channel adapter traits implemented by the HTTP clients.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{GenerateFailure, PublishFailure, SoapboxError};
pub use types::{
    Channel, ChannelId, GeneratedContent, PipelineJob, PostId, PostStatus, ProviderRequest,
    ProviderResponse, PublishReceipt, ScheduledPost, Template, TemplateId,
};

// Re-export adapter traits at crate root.
pub use traits::{ChannelApi, TextProvider};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn post_status_round_trips_through_wire_name() {
        let all = [
            PostStatus::Pending,
            PostStatus::Claimed,
            PostStatus::Generating,
            PostStatus::Generated,
            PostStatus::Publishing,
            PostStatus::Published,
            PostStatus::Failed,
        ];
        for status in all {
            let wire = status.to_string();
            let parsed = PostStatus::from_str(&wire).expect("should parse back");
            assert_eq!(status, parsed, "round-trip failed for {wire}");
        }
    }

    #[test]
    fn only_published_and_failed_are_terminal() {
        assert!(PostStatus::Published.is_terminal());
        assert!(PostStatus::Failed.is_terminal());
        for status in [
            PostStatus::Pending,
            PostStatus::Claimed,
            PostStatus::Generating,
            PostStatus::Generated,
            PostStatus::Publishing,
        ] {
            assert!(!status.is_terminal(), "{status} must not be terminal");
        }
    }

    #[test]
    fn generate_failure_retryability() {
        use std::time::Duration;

        assert!(GenerateFailure::RateLimited("429".into()).is_retryable());
        assert!(GenerateFailure::ProviderTimeout(Duration::from_secs(30)).is_retryable());
        assert!(GenerateFailure::Transient("503".into()).is_retryable());

        assert!(!GenerateFailure::MissingContext { placeholder: "name".into() }.is_retryable());
        assert!(!GenerateFailure::InvalidCredential("401".into()).is_retryable());
        assert!(!GenerateFailure::ContentPolicyRejected("flagged".into()).is_retryable());
    }

    #[test]
    fn publish_failure_retryability() {
        assert!(PublishFailure::ChannelRateLimited("429".into()).is_retryable());
        assert!(PublishFailure::Transient("502".into()).is_retryable());

        assert!(!PublishFailure::InvalidCredential("expired".into()).is_retryable());
        assert!(!PublishFailure::ContentRejected("too long".into()).is_retryable());
    }

    #[test]
    fn channel_debug_redacts_credential() {
        let channel = Channel {
            id: ChannelId("ch-1".into()),
            name: "Test Page".into(),
            remote_page_id: "9001".into(),
            credential: Some(secrecy::SecretString::from("super-secret-token".to_string())),
            max_content_len: Some(280),
            active: true,
        };
        let debug = format!("{channel:?}");
        assert!(!debug.contains("super-secret-token"), "got: {debug}");
        assert!(debug.contains("[REDACTED]"));
    }
}
