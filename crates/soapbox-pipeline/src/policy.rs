// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy: exponential backoff and the two independent exhaustion
//! limits (attempt count and wall-clock window).

use std::time::Duration;

use chrono::{DateTime, Utc};
use soapbox_config::model::PipelineConfig;

/// Retry policy applied by the orchestrator.
///
/// Constructed from configuration and passed in explicitly, so tests inject
/// deterministic budgets.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// A post reaching this many attempts is failed.
    pub max_attempts: u32,
    /// First backoff delay; each further attempt doubles it.
    pub base_backoff: Duration,
    /// Cap on any single backoff delay.
    pub max_backoff: Duration,
    /// Optional wall-clock cap past the due time, independent of the
    /// attempt budget.
    pub max_retry_window: Option<Duration>,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_backoff: Duration::from_secs(config.base_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            max_retry_window: config.max_retry_window_secs.map(Duration::from_secs),
        }
    }

    /// Backoff delay after the given attempt number (1-based):
    /// `base * 2^(attempts-1)`, capped at `max_backoff`.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        let delay = self
            .base_backoff
            .checked_mul(2u32.saturating_pow(exponent))
            .unwrap_or(self.max_backoff);
        delay.min(self.max_backoff)
    }

    /// Whether the post is out of retries: attempt budget spent, or the
    /// retry window past the due time has closed.
    pub fn exhausted(&self, attempts: u32, due_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if attempts >= self.max_attempts {
            return true;
        }
        if let Some(window) = self.max_retry_window
            && let Ok(window) = chrono::Duration::from_std(window)
            && now.signed_duration_since(due_at) > window
        {
            return true;
        }
        false
    }
}
