// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Soapbox automation pipeline.
//!
//! Two layers: [`SoapboxError`] is the framework-level error shared by every
//! crate (config, storage, infrastructure); [`GenerateFailure`] and
//! [`PublishFailure`] are the classified outcomes of the two external calls.
//! Classification happens where the failure originates; the orchestrator is
//! the only place that turns a classification into a retry-or-terminate
//! decision.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across Soapbox crates.
#[derive(Debug, Error)]
pub enum SoapboxError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database open, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Input that fails fast before any network call (bad template, bad id).
    #[error("validation error: {0}")]
    Validation(String),

    /// Backup archive errors (checksum mismatch, unreadable archive).
    #[error("backup error: {0}")]
    Backup(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classified failure of a content generation call.
///
/// `MissingContext` is detected locally before any provider traffic; the
/// remaining variants map provider responses. [`is_retryable`] is the single
/// source of truth consulted by the orchestrator's retry policy.
///
/// [`is_retryable`]: GenerateFailure::is_retryable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateFailure {
    /// A template placeholder has no value in the post's render context.
    #[error("missing context value for placeholder `{placeholder}`")]
    MissingContext { placeholder: String },

    /// The provider throttled the request.
    #[error("provider rate limited: {0}")]
    RateLimited(String),

    /// The provider rejected our API key.
    #[error("provider rejected credential: {0}")]
    InvalidCredential(String),

    /// The provider did not answer within the caller-enforced deadline.
    #[error("provider timed out after {0:?}")]
    ProviderTimeout(Duration),

    /// The provider refused to generate for this prompt. Retrying the same
    /// context would yield the same refusal.
    #[error("provider rejected content: {0}")]
    ContentPolicyRejected(String),

    /// Network or server-side failure with no classification of its own.
    #[error("transient provider failure: {0}")]
    Transient(String),
}

impl GenerateFailure {
    /// Whether the orchestrator may reschedule this post for another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::ProviderTimeout(_) | Self::Transient(_)
        )
    }
}

/// Classified failure of a publish call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishFailure {
    /// Missing, empty, or rejected channel credential.
    #[error("channel rejected credential: {0}")]
    InvalidCredential(String),

    /// The channel throttled the request.
    #[error("channel rate limited: {0}")]
    ChannelRateLimited(String),

    /// The channel refused the content itself (over length cap, policy).
    #[error("channel rejected content: {0}")]
    ContentRejected(String),

    /// Network or server-side failure, including publish timeouts.
    #[error("transient channel failure: {0}")]
    Transient(String),
}

impl PublishFailure {
    /// Whether the orchestrator may reschedule this post for another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChannelRateLimited(_) | Self::Transient(_))
    }
}
