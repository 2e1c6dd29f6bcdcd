// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pipeline state machine.
//!
//! The orchestrator owns a claimed post's lifecycle: it drives generation
//! and publishing in strict order, persists state between the two steps,
//! and is the single place that turns a classified failure plus the retry
//! policy into reschedule-or-terminate. Everything it does to a post goes
//! through the store's CAS transitions, so duplicate queue deliveries and
//! racing workers degrade to no-ops, never to double side effects.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use soapbox_core::{PostId, PostStatus, ScheduledPost, SoapboxError};
use soapbox_generator::ContentGenerator;
use soapbox_publisher::ChannelPublisher;
use soapbox_storage::Store;
use tracing::{debug, info, warn};

use crate::policy::RetryPolicy;

/// Queue name the trigger dispatches claimed posts onto.
pub const PIPELINE_QUEUE: &str = "pipeline";

/// What processing one post amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Terminal success; the remote post id is attached.
    Published { remote_post_id: String },
    /// Retryable failure; the post waits for its backoff gate.
    Retried { next_attempt_at: DateTime<Utc> },
    /// Terminal failure, recorded on the post.
    Failed { error: String },
    /// Nothing to do: the post moved on, was taken by another worker, or
    /// was terminated externally.
    Skipped { reason: String },
}

/// Drives claimed posts through generate -> publish.
pub struct Orchestrator {
    store: Arc<Store>,
    generator: Arc<ContentGenerator>,
    publisher: Arc<ChannelPublisher>,
    policy: RetryPolicy,
    lease: Duration,
    instance: String,
}

impl Orchestrator {
    pub fn new(
        store: Arc<Store>,
        generator: Arc<ContentGenerator>,
        publisher: Arc<ChannelPublisher>,
        policy: RetryPolicy,
        lease: Duration,
        instance: String,
    ) -> Self {
        Self {
            store,
            generator,
            publisher,
            policy,
            lease,
            instance,
        }
    }

    /// Sweep expired leases so crashed workers' posts become claimable.
    pub async fn recover_stale(&self, now: DateTime<Utc>) -> Result<usize, SoapboxError> {
        let recovered = self.store.recover_stale(now).await?;
        if recovered > 0 {
            warn!(recovered, "recovered posts from expired leases");
        }
        Ok(recovered)
    }

    /// Claim every currently due post, up to `batch`. Each claim is an
    /// individual CAS, so concurrent schedulers never double-claim.
    pub async fn claim_due(
        &self,
        now: DateTime<Utc>,
        batch: usize,
    ) -> Result<Vec<PostId>, SoapboxError> {
        let candidates = self.store.due_candidates(now, batch).await?;
        let mut claimed = Vec::new();
        for id in candidates {
            if self.store.claim(&id, &self.instance, now, self.lease).await? {
                claimed.push(id);
            }
        }
        if !claimed.is_empty() {
            info!(count = claimed.len(), "claimed due posts");
        }
        Ok(claimed)
    }

    /// Process one claimed post through to an outcome.
    ///
    /// Safe to call for stale or duplicate deliveries: anything that is not
    /// a post in `claimed` state turns into a `Skipped` outcome. The
    /// terminal-state check runs again between generation and publishing so
    /// an operator-forced failure aborts before the external side effect.
    pub async fn process(
        &self,
        post_id: &PostId,
        worker: &str,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, SoapboxError> {
        let Some(post) = self.store.get_post(post_id).await? else {
            warn!(post = %post_id.0, "job references unknown post");
            return Ok(ProcessOutcome::Skipped {
                reason: "post not found".into(),
            });
        };
        if post.status.is_terminal() {
            return Ok(ProcessOutcome::Skipped {
                reason: format!("already {}", post.status),
            });
        }
        if post.status != PostStatus::Claimed {
            return Ok(ProcessOutcome::Skipped {
                reason: format!("not claimed (status {})", post.status),
            });
        }

        // Generation step -- skipped entirely when content already exists,
        // either operator-written or persisted by a previous attempt.
        let content = match post.publishable_content() {
            Some(existing) => {
                if !self
                    .store
                    .take_over(post_id, worker, PostStatus::Generated, now, self.lease)
                    .await?
                {
                    return Ok(skipped_race());
                }
                debug!(post = %post_id.0, "content already present, skipping generation");
                existing.to_string()
            }
            None => {
                if !self
                    .store
                    .take_over(post_id, worker, PostStatus::Generating, now, self.lease)
                    .await?
                {
                    return Ok(skipped_race());
                }
                match self.run_generation(&post, worker, now).await? {
                    Ok(text) => text,
                    Err(outcome) => return Ok(outcome),
                }
            }
        };

        // Cancellation check between the steps.
        match self.store.get_post(post_id).await? {
            Some(current) if !current.status.is_terminal() => {}
            Some(current) => {
                info!(post = %post_id.0, status = %current.status, "terminated externally before publish");
                return Ok(ProcessOutcome::Skipped {
                    reason: "terminated externally before publish".into(),
                });
            }
            None => {
                return Ok(ProcessOutcome::Skipped {
                    reason: "post disappeared".into(),
                });
            }
        }

        self.run_publish(&post, worker, &content, now).await
    }

    /// Claim a specific post right now, bypassing the tick, and process it
    /// inline. The administrative run-now entry point.
    pub async fn run_now(
        &self,
        post_id: &PostId,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, SoapboxError> {
        if !self.store.claim(post_id, &self.instance, now, self.lease).await? {
            return Ok(ProcessOutcome::Skipped {
                reason: "post is not claimable".into(),
            });
        }
        self.process(post_id, &self.instance, now).await
    }

    async fn run_generation(
        &self,
        post: &ScheduledPost,
        worker: &str,
        now: DateTime<Utc>,
    ) -> Result<Result<String, ProcessOutcome>, SoapboxError> {
        let Some(template) = self.store.get_template(&post.template_id).await? else {
            let error = format!("template {} not found", post.template_id.0);
            self.store.mark_failed(&post.id, worker, &error, now).await?;
            return Ok(Err(ProcessOutcome::Failed { error }));
        };

        match self.generator.generate(&template, &post.context).await {
            Ok(generated) => {
                if generated.cached {
                    debug!(post = %post.id.0, "generation served from cache");
                }
                if !self
                    .store
                    .set_generated(&post.id, worker, &generated.text, now)
                    .await?
                {
                    return Ok(Err(skipped_race()));
                }
                Ok(Ok(generated.text))
            }
            Err(failure) => {
                let outcome = self
                    .handle_failure(
                        post,
                        worker,
                        failure.is_retryable(),
                        failure.to_string(),
                        PostStatus::Pending,
                        now,
                    )
                    .await?;
                Ok(Err(outcome))
            }
        }
    }

    async fn run_publish(
        &self,
        post: &ScheduledPost,
        worker: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, SoapboxError> {
        let Some(channel) = self.store.get_channel(&post.channel_id).await? else {
            let error = format!("channel {} not found", post.channel_id.0);
            self.store.mark_failed(&post.id, worker, &error, now).await?;
            return Ok(ProcessOutcome::Failed { error });
        };

        if !self.store.begin_publishing(&post.id, worker, now).await? {
            return Ok(skipped_race());
        }

        match self.publisher.publish(&channel, content, &post.id.0).await {
            Ok(receipt) => {
                if receipt.already_published {
                    info!(post = %post.id.0, "duplicate delivery deduplicated by remote lookup");
                }
                if self
                    .store
                    .mark_published(&post.id, worker, &receipt.remote_post_id, now)
                    .await?
                {
                    Ok(ProcessOutcome::Published {
                        remote_post_id: receipt.remote_post_id,
                    })
                } else {
                    Ok(skipped_race())
                }
            }
            Err(failure) => {
                // Content is already persisted: retries resume at publish.
                self.handle_failure(
                    post,
                    worker,
                    failure.is_retryable(),
                    failure.to_string(),
                    PostStatus::Generated,
                    now,
                )
                .await
            }
        }
    }

    /// The single retry-or-terminate decision point.
    async fn handle_failure(
        &self,
        post: &ScheduledPost,
        worker: &str,
        retryable: bool,
        error: String,
        revert_to: PostStatus,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, SoapboxError> {
        // `post.attempts` already includes this attempt (claim increments).
        if retryable && !self.policy.exhausted(post.attempts, post.due_at, now) {
            let delay = self.policy.backoff_delay(post.attempts);
            let next_attempt_at =
                now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
            if self
                .store
                .retry_later(&post.id, worker, revert_to, &error, next_attempt_at, now)
                .await?
            {
                warn!(
                    post = %post.id.0,
                    attempts = post.attempts,
                    delay_secs = delay.as_secs(),
                    error = %error,
                    "retryable failure, rescheduled"
                );
                Ok(ProcessOutcome::Retried { next_attempt_at })
            } else {
                Ok(skipped_race())
            }
        } else {
            let error = if retryable {
                format!("{error} (retry budget exhausted after {} attempts)", post.attempts)
            } else {
                error
            };
            if self.store.mark_failed(&post.id, worker, &error, now).await? {
                warn!(post = %post.id.0, attempts = post.attempts, error = %error, "post failed");
                Ok(ProcessOutcome::Failed { error })
            } else {
                Ok(skipped_race())
            }
        }
    }
}

fn skipped_race() -> ProcessOutcome {
    ProcessOutcome::Skipped {
        reason: "lost the lease to another worker".into(),
    }
}
