// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pipeline tick: what's due, dispatch it.
//!
//! The trigger carries no business logic. Claim atomicity makes it safe to
//! run more often than needed (nothing is dispatched twice), and skipping a
//! tick only delays posts -- due-selection always re-evaluates from
//! persisted state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use soapbox_core::{PipelineJob, SoapboxError};
use soapbox_pipeline::{Orchestrator, PIPELINE_QUEUE};
use soapbox_storage::Store;
use tracing::{debug, info};

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// Posts swept back from expired leases.
    pub recovered: usize,
    /// Posts claimed and enqueued this tick.
    pub dispatched: usize,
}

/// Periodic due-selection driver.
pub struct Trigger {
    orchestrator: Arc<Orchestrator>,
    store: Arc<Store>,
    batch_size: usize,
    queue_max_attempts: u32,
}

impl Trigger {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<Store>,
        batch_size: usize,
        queue_max_attempts: u32,
    ) -> Self {
        Self {
            orchestrator,
            store,
            batch_size,
            queue_max_attempts,
        }
    }

    /// One tick: recover stale leases, claim due posts, enqueue each.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickSummary, SoapboxError> {
        let recovered = self.orchestrator.recover_stale(now).await?;
        let claimed = self.orchestrator.claim_due(now, self.batch_size).await?;

        let mut dispatched = 0;
        for post_id in claimed {
            let payload = serde_json::to_string(&PipelineJob {
                post_id: post_id.clone(),
            })
            .map_err(|e| SoapboxError::Internal(format!("failed to encode job: {e}")))?;
            self.store
                .push_job(PIPELINE_QUEUE, &payload, self.queue_max_attempts)
                .await?;
            debug!(post = %post_id.0, "dispatched");
            dispatched += 1;
        }

        if dispatched > 0 || recovered > 0 {
            info!(dispatched, recovered, "tick complete");
        }
        Ok(TickSummary {
            recovered,
            dispatched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soapbox_test_utils::PipelineHarness;

    fn trigger(harness: &PipelineHarness) -> Trigger {
        Trigger::new(
            Arc::clone(&harness.orchestrator),
            Arc::clone(&harness.store),
            50,
            3,
        )
    }

    #[tokio::test]
    async fn tick_dispatches_due_posts_once() {
        let harness = PipelineHarness::builder().build().await;
        let now = Utc::now();
        harness.seed_channel("ch-1", Some("token"), true).await;
        harness.seed_template("t-1", "Hello {name}!").await;
        harness
            .seed_post("p-1", "ch-1", "t-1", now - chrono::Duration::minutes(1), &[("name", "Ana")])
            .await;

        let trigger = trigger(&harness);
        let summary = trigger.tick(now).await.unwrap();
        assert_eq!(summary.dispatched, 1);
        assert_eq!(harness.store.queue_depth(PIPELINE_QUEUE).await.unwrap(), 1);

        // Extra tick: claim atomicity prevents duplicate dispatch.
        let summary = trigger.tick(now).await.unwrap();
        assert_eq!(summary.dispatched, 0);
        assert_eq!(harness.store.queue_depth(PIPELINE_QUEUE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn tick_with_nothing_due_is_a_no_op() {
        let harness = PipelineHarness::builder().build().await;
        let now = Utc::now();
        harness.seed_channel("ch-1", Some("token"), true).await;
        harness.seed_template("t-1", "Hello {name}!").await;
        harness
            .seed_post("p-1", "ch-1", "t-1", now + chrono::Duration::hours(1), &[("name", "Ana")])
            .await;

        let summary = trigger(&harness).tick(now).await.unwrap();
        assert_eq!(summary, TickSummary { recovered: 0, dispatched: 0 });
    }

    #[tokio::test]
    async fn batch_size_bounds_one_tick_but_loses_nothing() {
        let harness = PipelineHarness::builder().build().await;
        let now = Utc::now();
        harness.seed_channel("ch-1", Some("token"), true).await;
        harness.seed_template("t-1", "Hello {name}!").await;
        for i in 0..5 {
            harness
                .seed_post(
                    &format!("p-{i}"),
                    "ch-1",
                    "t-1",
                    now - chrono::Duration::minutes(1),
                    &[("name", "Ana")],
                )
                .await;
        }

        let trigger = Trigger::new(
            Arc::clone(&harness.orchestrator),
            Arc::clone(&harness.store),
            2,
            3,
        );
        assert_eq!(trigger.tick(now).await.unwrap().dispatched, 2);
        assert_eq!(trigger.tick(now).await.unwrap().dispatched, 2);
        assert_eq!(trigger.tick(now).await.unwrap().dispatched, 1);
        assert_eq!(harness.store.queue_depth(PIPELINE_QUEUE).await.unwrap(), 5);
    }
}
