// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `PipelineHarness` assembles the full stack -- temp SQLite store, cache,
//! generator and publisher wired to mock adapters, and the orchestrator --
//! so tests drive real claim/lease transitions against scripted external
//! behavior.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use soapbox_cache::ContentCache;
use soapbox_core::{
    Channel, ChannelId, PostId, PostStatus, ScheduledPost, Template, TemplateId,
};
use soapbox_generator::ContentGenerator;
use soapbox_pipeline::{Orchestrator, RetryPolicy};
use soapbox_publisher::ChannelPublisher;
use soapbox_storage::Store;

use crate::mock_channel::MockChannel;
use crate::mock_provider::MockProvider;

/// Builder for creating pipeline test environments.
pub struct PipelineHarnessBuilder {
    policy: RetryPolicy,
    responses: Vec<String>,
    lease: Duration,
    cache_ttl: Duration,
}

impl PipelineHarnessBuilder {
    fn new() -> Self {
        Self {
            policy: RetryPolicy {
                max_attempts: 5,
                base_backoff: Duration::from_secs(60),
                max_backoff: Duration::from_secs(3600),
                max_retry_window: None,
            },
            responses: Vec::new(),
            lease: Duration::from_secs(300),
            cache_ttl: Duration::from_secs(300),
        }
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pre-load mock provider responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Override the claim lease duration.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Override the generation cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Build the harness, creating all subsystems on a temp database.
    pub async fn build(self) -> PipelineHarness {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("pipeline.db");
        let store = Arc::new(
            Store::open(db_path.to_str().expect("utf-8 path"))
                .await
                .expect("open store"),
        );

        let provider = Arc::new(if self.responses.is_empty() {
            MockProvider::new()
        } else {
            MockProvider::with_responses(self.responses)
        });
        let channel_api = Arc::new(MockChannel::new());
        let cache = Arc::new(ContentCache::new(self.cache_ttl));

        let generator = Arc::new(ContentGenerator::new(
            Arc::clone(&provider) as Arc<dyn soapbox_core::TextProvider>,
            Arc::clone(&cache),
            self.cache_ttl,
        ));
        let publisher = Arc::new(ChannelPublisher::new(
            Arc::clone(&channel_api) as Arc<dyn soapbox_core::ChannelApi>,
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store),
            generator,
            publisher,
            self.policy,
            self.lease,
            "test".to_string(),
        ));

        PipelineHarness {
            store,
            provider,
            channel_api,
            cache,
            orchestrator,
            lease: self.lease,
            _dir: dir,
        }
    }
}

/// A fully wired pipeline over a temp database and mock externals.
pub struct PipelineHarness {
    pub store: Arc<Store>,
    pub provider: Arc<MockProvider>,
    pub channel_api: Arc<MockChannel>,
    pub cache: Arc<ContentCache>,
    pub orchestrator: Arc<Orchestrator>,
    pub lease: Duration,
    _dir: tempfile::TempDir,
}

impl PipelineHarness {
    pub fn builder() -> PipelineHarnessBuilder {
        PipelineHarnessBuilder::new()
    }

    /// Insert a channel. `credential: None` models an unconfigured channel.
    pub async fn seed_channel(&self, id: &str, credential: Option<&str>, active: bool) {
        self.store
            .insert_channel(
                &Channel {
                    id: ChannelId(id.to_string()),
                    name: format!("Channel {id}"),
                    remote_page_id: format!("page-{id}"),
                    credential: credential.map(|c| SecretString::from(c.to_string())),
                    max_content_len: None,
                    active,
                },
                Utc::now(),
            )
            .await
            .expect("seed channel");
    }

    /// Insert a template with post-processing flags off, so provider text
    /// passes through unchanged.
    pub async fn seed_template(&self, id: &str, prompt: &str) {
        self.store
            .insert_template(
                &Template {
                    id: TemplateId(id.to_string()),
                    name: format!("Template {id}"),
                    prompt: prompt.to_string(),
                    model: "textsmith-mini".to_string(),
                    temperature: 0.7,
                    max_output_len: 500,
                    include_hashtags: false,
                    max_hashtags: 5,
                    include_emojis: false,
                },
                Utc::now(),
            )
            .await
            .expect("seed template");
    }

    /// Insert a pending post due at `due_at`.
    pub async fn seed_post(
        &self,
        id: &str,
        channel: &str,
        template: &str,
        due_at: DateTime<Utc>,
        context: &[(&str, &str)],
    ) {
        let now = Utc::now();
        self.store
            .insert_post(&ScheduledPost {
                id: PostId(id.to_string()),
                channel_id: ChannelId(channel.to_string()),
                template_id: TemplateId(template.to_string()),
                due_at,
                context: context
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
                status: PostStatus::Pending,
                attempts: 0,
                last_error: None,
                manual_content: None,
                generated_content: None,
                remote_post_id: None,
                lease_holder: None,
                lease_expires_at: None,
                next_attempt_at: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed post");
    }

    /// Load a post that must exist.
    pub async fn post(&self, id: &str) -> ScheduledPost {
        self.store
            .get_post(&PostId(id.to_string()))
            .await
            .expect("get post")
            .expect("post exists")
    }

    /// Claim and process `id` once, as the pipeline would on one delivery.
    pub async fn run_once(&self, id: &str, now: DateTime<Utc>) -> soapbox_pipeline::ProcessOutcome {
        self.orchestrator
            .run_now(&PostId(id.to_string()), now)
            .await
            .expect("process post")
    }
}
