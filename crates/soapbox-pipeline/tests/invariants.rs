// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property-based checks over random failure/success sequences: whatever
//! order of classified outcomes the externals produce, the post's record
//! stays consistent.

use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;
use soapbox_core::{GenerateFailure, PostStatus, PublishFailure};
use soapbox_pipeline::{ProcessOutcome, RetryPolicy};
use soapbox_test_utils::PipelineHarness;

/// One scripted round of external behavior.
#[derive(Debug, Clone)]
enum Round {
    GenRateLimited,
    GenTimeout,
    GenPolicyRejected,
    PubRateLimited,
    PubBadCredential,
    PubTransient,
    Success,
}

fn round_strategy() -> impl Strategy<Value = Round> {
    prop_oneof![
        Just(Round::GenRateLimited),
        Just(Round::GenTimeout),
        Just(Round::GenPolicyRejected),
        Just(Round::PubRateLimited),
        Just(Round::PubBadCredential),
        Just(Round::PubTransient),
        Just(Round::Success),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// For every sequence of classified outcomes:
    /// - `remote_post_id` is set if and only if the post is `published`
    /// - attempts only ever grow, and never past the budget
    /// - a failed post always retains its last error
    #[test]
    fn remote_id_iff_published_over_random_sequences(
        rounds in prop::collection::vec(round_strategy(), 1..10)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        runtime.block_on(async move {
            let policy = RetryPolicy {
                max_attempts: 4,
                base_backoff: Duration::from_secs(1),
                max_backoff: Duration::from_secs(8),
                max_retry_window: None,
            };
            let harness = PipelineHarness::builder().with_policy(policy).build().await;
            let mut now = Utc::now();

            harness.seed_channel("ch-1", Some("token"), true).await;
            harness.seed_template("t-1", "Hello {name}!").await;
            harness.seed_post("p-1", "ch-1", "t-1", now, &[("name", "Ana")]).await;

            let mut previous_attempts = 0u32;

            for round in rounds {
                // Script the externals for this round. Generation may be
                // skipped (cached or already persisted), so provider
                // scripting is best-effort; channel scripting drives the
                // publish outcome.
                match round {
                    Round::GenRateLimited => harness
                        .provider
                        .push_failure(GenerateFailure::RateLimited("429".into())),
                    Round::GenTimeout => harness
                        .provider
                        .push_failure(GenerateFailure::ProviderTimeout(Duration::from_secs(30))),
                    Round::GenPolicyRejected => harness
                        .provider
                        .push_failure(GenerateFailure::ContentPolicyRejected("flagged".into())),
                    Round::PubRateLimited => harness
                        .channel_api
                        .push_create_failure(PublishFailure::ChannelRateLimited("429".into())),
                    Round::PubBadCredential => harness
                        .channel_api
                        .push_create_failure(PublishFailure::InvalidCredential("expired".into())),
                    Round::PubTransient => harness
                        .channel_api
                        .push_create_failure(PublishFailure::Transient("502".into())),
                    Round::Success => {}
                }

                let outcome = harness.run_once("p-1", now).await;
                let post = harness.post("p-1").await;

                // Invariant: remote id <=> published, at every step.
                prop_assert_eq!(
                    post.remote_post_id.is_some(),
                    post.status == PostStatus::Published,
                    "remote id {:?} vs status {:?}",
                    post.remote_post_id,
                    post.status
                );

                // Invariant: attempts never reset, never exceed the budget.
                prop_assert!(post.attempts >= previous_attempts);
                prop_assert!(post.attempts <= 4);
                previous_attempts = post.attempts;

                if post.status == PostStatus::Failed {
                    prop_assert!(
                        post.last_error.is_some(),
                        "failed posts keep their error for inspection"
                    );
                }

                if post.status.is_terminal() {
                    prop_assert!(
                        matches!(
                            outcome,
                            ProcessOutcome::Published { .. }
                                | ProcessOutcome::Failed { .. }
                                | ProcessOutcome::Skipped { .. }
                        ),
                        "terminal status yields a terminal outcome"
                    );
                    break;
                }

                // Jump past any backoff gate.
                now += chrono::Duration::hours(3);
            }

            // However the sequence ended, at most one remote post exists.
            prop_assert!(harness.channel_api.created_posts().len() <= 1);
            Ok(())
        })?;
    }
}
