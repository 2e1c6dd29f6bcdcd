// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end pipeline flows against mock externals: the happy path,
//! retry/backoff behavior, idempotent publishing, crash recovery, and
//! operator cancellation.

use std::time::Duration;

use chrono::Utc;
use soapbox_core::{GenerateFailure, PostId, PostStatus, PublishFailure};
use soapbox_pipeline::{ProcessOutcome, RetryPolicy, worker};
use soapbox_test_utils::PipelineHarness;

fn tight_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_backoff: Duration::from_secs(60),
        max_backoff: Duration::from_secs(3600),
        max_retry_window: None,
    }
}

#[tokio::test]
async fn due_post_generates_and_publishes() {
    let harness = PipelineHarness::builder()
        .with_mock_responses(vec!["Hello Ana!".into()])
        .build()
        .await;
    let now = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness
        .seed_post("p-1", "ch-1", "t-greet", now - chrono::Duration::minutes(1), &[("name", "Ana")])
        .await;

    let outcome = harness.run_once("p-1", now).await;
    let ProcessOutcome::Published { remote_post_id } = outcome else {
        panic!("expected Published, got {outcome:?}");
    };

    let post = harness.post("p-1").await;
    assert_eq!(post.status, PostStatus::Published);
    assert_eq!(post.remote_post_id.as_deref(), Some(remote_post_id.as_str()));
    assert_eq!(post.generated_content.as_deref(), Some("Hello Ana!"));
    assert_eq!(post.attempts, 1);
    assert!(post.last_error.is_none());

    let created = harness.channel_api.created_posts();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].content, "Hello Ana!");
    assert_eq!(created[0].client_ref, "p-1");
}

#[tokio::test]
async fn rate_limited_thrice_then_succeeds_with_backoff() {
    let harness = PipelineHarness::builder()
        .with_policy(tight_policy(5))
        .build()
        .await;
    let base = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness
        .seed_post("p-1", "ch-1", "t-greet", base - chrono::Duration::minutes(1), &[("name", "Ana")])
        .await;

    for _ in 0..3 {
        harness
            .provider
            .push_failure(GenerateFailure::RateLimited("throttled".into()));
    }
    harness.provider.push_response("Hello Ana!");

    // Three retryable failures, each observing the doubled backoff.
    let mut now = base;
    for attempt in 1..=3u32 {
        let outcome = harness.run_once("p-1", now).await;
        let ProcessOutcome::Retried { next_attempt_at } = outcome else {
            panic!("attempt {attempt}: expected Retried, got {outcome:?}");
        };
        let expected_delay = chrono::Duration::seconds(60 * 2i64.pow(attempt - 1));
        assert_eq!(next_attempt_at, now + expected_delay, "attempt {attempt} backoff");

        let post = harness.post("p-1").await;
        assert_eq!(post.status, PostStatus::Pending);
        assert_eq!(post.attempts, attempt);
        now = next_attempt_at;
    }

    // Fourth attempt succeeds.
    let outcome = harness.run_once("p-1", now).await;
    assert!(matches!(outcome, ProcessOutcome::Published { .. }), "got {outcome:?}");

    let post = harness.post("p-1").await;
    assert_eq!(post.status, PostStatus::Published);
    assert_eq!(post.attempts, 4, "three failures plus one success");
    assert_eq!(harness.provider.call_count(), 4);
}

#[tokio::test]
async fn missing_channel_credential_fails_terminally_after_generation() {
    let harness = PipelineHarness::builder()
        .with_mock_responses(vec!["Hello Ana!".into()])
        .build()
        .await;
    let now = Utc::now();

    harness.seed_channel("ch-bare", None, true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness
        .seed_post("p-1", "ch-bare", "t-greet", now, &[("name", "Ana")])
        .await;

    let outcome = harness.run_once("p-1", now).await;
    let ProcessOutcome::Failed { error } = outcome else {
        panic!("expected Failed, got {outcome:?}");
    };
    assert!(error.contains("no credential"), "got: {error}");

    let post = harness.post("p-1").await;
    assert_eq!(post.status, PostStatus::Failed);
    assert_eq!(post.attempts, 1, "non-retryable failure does not retry");
    assert_eq!(
        post.generated_content.as_deref(),
        Some("Hello Ana!"),
        "generation succeeded before the publish failure"
    );
    assert!(post.remote_post_id.is_none());
}

#[tokio::test]
async fn retry_budget_exhausts_exactly_at_max_attempts() {
    let harness = PipelineHarness::builder()
        .with_policy(tight_policy(3))
        .build()
        .await;
    let base = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness
        .seed_post("p-1", "ch-1", "t-greet", base, &[("name", "Ana")])
        .await;

    for _ in 0..5 {
        harness
            .provider
            .push_failure(GenerateFailure::Transient("flaky".into()));
    }

    let mut now = base;
    // Attempts 1 and 2: still inside the budget.
    for attempt in 1..=2u32 {
        let outcome = harness.run_once("p-1", now).await;
        assert!(matches!(outcome, ProcessOutcome::Retried { .. }), "attempt {attempt}: {outcome:?}");
        now += chrono::Duration::hours(2);
    }

    // Attempt 3 == budget: terminal, never a fourth.
    let outcome = harness.run_once("p-1", now).await;
    let ProcessOutcome::Failed { error } = outcome else {
        panic!("expected Failed, got {outcome:?}");
    };
    assert!(error.contains("retry budget exhausted"), "got: {error}");

    let post = harness.post("p-1").await;
    assert_eq!(post.status, PostStatus::Failed);
    assert_eq!(post.attempts, 3);
    assert!(post.last_error.is_some());

    // Terminal means unclaimable: nothing further happens.
    let again = harness.run_once("p-1", now).await;
    assert!(matches!(again, ProcessOutcome::Skipped { .. }));
}

#[tokio::test]
async fn wall_clock_window_fails_independently_of_attempts() {
    let mut policy = tight_policy(10);
    policy.max_retry_window = Some(Duration::from_secs(3600));
    let harness = PipelineHarness::builder().with_policy(policy).build().await;
    let now = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    // Due two hours ago: the retry window has already closed.
    harness
        .seed_post("p-1", "ch-1", "t-greet", now - chrono::Duration::hours(2), &[("name", "Ana")])
        .await;
    harness
        .provider
        .push_failure(GenerateFailure::RateLimited("throttled".into()));

    let outcome = harness.run_once("p-1", now).await;
    assert!(matches!(outcome, ProcessOutcome::Failed { .. }), "got {outcome:?}");
    let post = harness.post("p-1").await;
    assert_eq!(post.attempts, 1, "window closed on the first attempt");
}

#[tokio::test]
async fn publish_retry_reuses_persisted_content() {
    let harness = PipelineHarness::builder()
        .with_mock_responses(vec!["Generated once.".into()])
        .build()
        .await;
    let base = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness
        .seed_post("p-1", "ch-1", "t-greet", base, &[("name", "Ana")])
        .await;
    harness
        .channel_api
        .push_create_failure(PublishFailure::ChannelRateLimited("channel busy".into()));

    let outcome = harness.run_once("p-1", base).await;
    let ProcessOutcome::Retried { next_attempt_at } = outcome else {
        panic!("expected Retried, got {outcome:?}");
    };

    // Content survived the failed publish; the post waits as `generated`.
    let post = harness.post("p-1").await;
    assert_eq!(post.status, PostStatus::Generated);
    assert_eq!(post.generated_content.as_deref(), Some("Generated once."));

    let outcome = harness.run_once("p-1", next_attempt_at).await;
    assert!(matches!(outcome, ProcessOutcome::Published { .. }), "got {outcome:?}");
    assert_eq!(
        harness.provider.call_count(),
        1,
        "publish retry must not regenerate content"
    );
}

#[tokio::test]
async fn duplicate_delivery_does_not_double_publish() {
    let harness = PipelineHarness::builder()
        .with_mock_responses(vec!["Hello Ana!".into()])
        .build()
        .await;
    let now = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness
        .seed_post("p-1", "ch-1", "t-greet", now, &[("name", "Ana")])
        .await;

    let first = harness.run_once("p-1", now).await;
    assert!(matches!(first, ProcessOutcome::Published { .. }));

    // Same unit delivered again: terminal post, no second remote post.
    let second = harness.run_once("p-1", now).await;
    assert!(matches!(second, ProcessOutcome::Skipped { .. }), "got {second:?}");
    assert_eq!(harness.channel_api.create_count(), 1);
}

#[tokio::test]
async fn crash_after_remote_create_is_healed_by_the_idempotency_guard() {
    // A previous worker's submit landed remotely, but the worker died
    // before recording it. The replacement attempt must adopt the existing
    // remote post instead of creating a duplicate.
    let harness = PipelineHarness::builder().build().await;
    let now = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness
        .seed_post("p-1", "ch-1", "t-greet", now, &[("name", "Ana")])
        .await;
    harness.channel_api.seed_existing("p-1", "page-ch-1_777");
    harness.provider.push_response("Hello Ana!");

    let outcome = harness.run_once("p-1", now).await;
    let ProcessOutcome::Published { remote_post_id } = outcome else {
        panic!("expected Published, got {outcome:?}");
    };
    assert_eq!(remote_post_id, "page-ch-1_777");
    assert_eq!(harness.channel_api.create_count(), 0, "no duplicate remote post");

    let post = harness.post("p-1").await;
    assert_eq!(post.remote_post_id.as_deref(), Some("page-ch-1_777"));
}

#[tokio::test]
async fn lease_recovery_resumes_at_publish_without_regenerating() {
    let harness = PipelineHarness::builder()
        .with_lease(Duration::from_secs(60))
        .build()
        .await;
    let t0 = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness
        .seed_post("p-1", "ch-1", "t-greet", t0 - chrono::Duration::minutes(5), &[("name", "Ana")])
        .await;

    // A worker claims, persists content, then dies before publishing.
    let id = PostId("p-1".into());
    let lease = Duration::from_secs(60);
    assert!(harness.store.claim(&id, "scheduler", t0, lease).await.unwrap());
    assert!(
        harness
            .store
            .take_over(&id, "dead-worker", PostStatus::Generating, t0, lease)
            .await
            .unwrap()
    );
    assert!(
        harness
            .store
            .set_generated(&id, "dead-worker", "Hello Ana!", t0)
            .await
            .unwrap()
    );

    // Lease expires; the sweep makes the post claimable again.
    let t1 = t0 + chrono::Duration::minutes(5);
    assert_eq!(harness.orchestrator.recover_stale(t1).await.unwrap(), 1);
    let claimed = harness.orchestrator.claim_due(t1, 50).await.unwrap();
    assert_eq!(claimed, vec![id.clone()]);

    let outcome = harness.orchestrator.process(&id, "w-0", t1).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Published { .. }), "got {outcome:?}");
    assert_eq!(harness.provider.call_count(), 0, "recovered publish must not regenerate");

    let post = harness.post("p-1").await;
    assert_eq!(post.generated_content.as_deref(), Some("Hello Ana!"));
    assert_eq!(post.attempts, 2, "original claim plus the recovery claim");
}

#[tokio::test]
async fn operator_cancellation_aborts_before_publish() {
    let harness = PipelineHarness::builder().build().await;
    let now = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness
        .seed_post("p-1", "ch-1", "t-greet", now, &[("name", "Ana")])
        .await;

    let id = PostId("p-1".into());
    assert!(
        harness
            .store
            .claim(&id, "scheduler", now, harness.lease)
            .await
            .unwrap()
    );
    // Operator pulls the plug after the claim but before a worker runs.
    assert!(harness.store.force_fail(&id, "cancelled by operator", now).await.unwrap());

    let outcome = harness.orchestrator.process(&id, "w-0", now).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Skipped { .. }), "got {outcome:?}");
    assert_eq!(harness.channel_api.create_count(), 0);
    assert_eq!(harness.provider.call_count(), 0);

    let post = harness.post("p-1").await;
    assert_eq!(post.status, PostStatus::Failed);
    assert_eq!(post.last_error.as_deref(), Some("cancelled by operator"));
}

#[tokio::test]
async fn manual_content_skips_generation_entirely() {
    let harness = PipelineHarness::builder().build().await;
    let now = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness.seed_post("p-1", "ch-1", "t-greet", now, &[]).await;

    // Operator supplies the copy by hand.
    let posts = harness.store.list_posts(None).await.unwrap();
    assert_eq!(posts.len(), 1);
    let mut post = posts.into_iter().next().unwrap();
    post.manual_content = Some("Hand-written announcement.".into());
    post.id = PostId("p-manual".into());
    harness.store.insert_post(&post).await.unwrap();

    let outcome = harness.run_once("p-manual", now).await;
    assert!(matches!(outcome, ProcessOutcome::Published { .. }), "got {outcome:?}");
    assert_eq!(harness.provider.call_count(), 0, "no generation for manual content");

    let created = harness.channel_api.created_posts();
    assert_eq!(created[0].content, "Hand-written announcement.");
}

#[tokio::test]
async fn worker_settles_jobs_from_the_queue() {
    let harness = PipelineHarness::builder()
        .with_mock_responses(vec!["Hello Ana!".into()])
        .build()
        .await;
    let now = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    harness
        .seed_post("p-1", "ch-1", "t-greet", now - chrono::Duration::minutes(1), &[("name", "Ana")])
        .await;

    // Trigger-side: claim and enqueue.
    let claimed = harness.orchestrator.claim_due(now, 50).await.unwrap();
    assert_eq!(claimed.len(), 1);
    let payload =
        serde_json::to_string(&soapbox_core::PipelineJob { post_id: claimed[0].clone() }).unwrap();
    harness
        .store
        .push_job(soapbox_pipeline::PIPELINE_QUEUE, &payload, 3)
        .await
        .unwrap();

    // Worker-side: pull and handle.
    let job = harness
        .store
        .pull_job(soapbox_pipeline::PIPELINE_QUEUE, now, Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();
    worker::handle_job(&harness.store, &harness.orchestrator, "test-w0", job).await;

    let post = harness.post("p-1").await;
    assert_eq!(post.status, PostStatus::Published);
    assert_eq!(
        harness
            .store
            .queue_depth(soapbox_pipeline::PIPELINE_QUEUE)
            .await
            .unwrap(),
        0,
        "job settled"
    );
}

#[tokio::test]
async fn claim_due_dispatches_each_post_to_one_claimant_only() {
    let harness = PipelineHarness::builder().build().await;
    let now = Utc::now();

    harness.seed_channel("ch-1", Some("token"), true).await;
    harness.seed_template("t-greet", "Hello {name}!").await;
    for i in 0..5 {
        harness
            .seed_post(
                &format!("p-{i}"),
                "ch-1",
                "t-greet",
                now - chrono::Duration::minutes(1),
                &[("name", "Ana")],
            )
            .await;
    }

    // Two concurrent trigger ticks over the same due set.
    let (a, b) = tokio::join!(
        harness.orchestrator.claim_due(now, 50),
        harness.orchestrator.claim_due(now, 50)
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_eq!(a.len() + b.len(), 5, "every post claimed exactly once");
    for id in &a {
        assert!(!b.contains(id), "post {id:?} double-claimed");
    }
}
