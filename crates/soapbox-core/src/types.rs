// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Soapbox pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a scheduled post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(pub String);

/// Unique identifier for a publishing channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

/// Unique identifier for a content template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

impl PostId {
    /// Mint a fresh random post id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Pipeline state of a scheduled post.
///
/// This is a closed state machine, not a display label -- the wire names
/// below are what storage persists, and [`PostStatus::label`] carries the
/// operator-facing text separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Waiting for its due time.
    Pending,
    /// Exclusively leased by a worker, not yet generating.
    Claimed,
    /// Content generation in flight.
    Generating,
    /// Content persisted, publish not yet started.
    Generated,
    /// Publish call in flight.
    Publishing,
    /// Delivered; `remote_post_id` is set. Terminal.
    Published,
    /// Out of retries or hit a non-retryable failure. Terminal.
    Failed,
}

impl PostStatus {
    /// Whether the post has reached an end state the pipeline never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }

    /// Whether a stale lease on this status can be recovered by the sweep.
    pub fn is_leased(self) -> bool {
        matches!(self, Self::Claimed | Self::Generating | Self::Publishing)
    }

    /// Operator-facing label, distinct from the persisted wire name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Scheduled",
            Self::Claimed => "Picked up",
            Self::Generating => "Generating content",
            Self::Generated => "Ready to publish",
            Self::Publishing => "Publishing",
            Self::Published => "Published",
            Self::Failed => "Failed",
        }
    }
}

/// One post's full lifecycle record, from due time to terminal outcome.
#[derive(Debug, Clone)]
pub struct ScheduledPost {
    pub id: PostId,
    pub channel_id: ChannelId,
    pub template_id: TemplateId,
    /// When the post should go out. Due-selection compares against this.
    pub due_at: DateTime<Utc>,
    /// Values for the template's named placeholders. Sorted keys so the
    /// cache key derived from it is deterministic.
    pub context: BTreeMap<String, String>,
    pub status: PostStatus,
    /// Total processing attempts so far. Monotonically increasing, never
    /// reset by a retry.
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Operator-written content. When present the generation step is skipped.
    pub manual_content: Option<String>,
    /// Set once generation succeeds; publish never regenerates.
    pub generated_content: Option<String>,
    /// Set if and only if `status == Published`.
    pub remote_post_id: Option<String>,
    pub lease_holder: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Backoff gate: due-selection skips the post until this passes.
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledPost {
    /// The content the publish step will submit, if any exists yet.
    pub fn publishable_content(&self) -> Option<&str> {
        self.manual_content
            .as_deref()
            .or(self.generated_content.as_deref())
    }
}

/// A publishing destination.
///
/// `Debug` deliberately omits the credential value.
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    /// Page identifier on the remote publishing API.
    pub remote_page_id: String,
    /// Opaque access credential. Never logged, never formatted.
    pub credential: Option<SecretString>,
    /// Channel capability: hard cap on content length, in characters.
    pub max_content_len: Option<usize>,
    /// Inactive channels are excluded from due-selection.
    pub active: bool,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("remote_page_id", &self.remote_page_id)
            .field(
                "credential",
                &self.credential.as_ref().map(|_| "[REDACTED]"),
            )
            .field("max_content_len", &self.max_content_len)
            .field("active", &self.active)
            .finish()
    }
}

impl Channel {
    /// Whether the channel carries a non-empty credential.
    pub fn has_credential(&self) -> bool {
        use secrecy::ExposeSecret;
        self.credential
            .as_ref()
            .is_some_and(|c| !c.expose_secret().is_empty())
    }
}

/// A prompt pattern plus the generation options applied to it.
#[derive(Debug, Clone)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    /// Prompt pattern with named `{placeholder}` slots.
    pub prompt: String,
    pub model: String,
    /// Sampling temperature, validated into `[0, 1]`.
    pub temperature: f64,
    /// Upper bound on generated content length, in characters.
    pub max_output_len: usize,
    pub include_hashtags: bool,
    pub max_hashtags: u32,
    pub include_emojis: bool,
}

/// Request to the generative text provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
    pub max_output_length: usize,
}

/// Response from the generative text provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
}

/// Outcome of a generation call, with cache observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub text: String,
    /// True when the text came from the cache without a provider call.
    pub cached: bool,
}

/// Outcome of a publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Durable dedup key assigned by the channel API.
    pub remote_post_id: String,
    /// True when the idempotency guard found a prior submission and no new
    /// remote post was created.
    pub already_published: bool,
}

/// Payload of one queued pipeline job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineJob {
    pub post_id: PostId,
}
