// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed facade over the SQLite database.
//!
//! Wraps a [`Database`] handle and delegates to the query modules, so the
//! orchestrator and CLI depend on one surface instead of individual query
//! functions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use soapbox_core::{
    Channel, ChannelId, PostId, PostStatus, ScheduledPost, SoapboxError, Template, TemplateId,
};

use crate::database::Database;
use crate::queries;
pub use crate::queries::jobs::Job;

/// SQLite-backed store for the whole pipeline state.
pub struct Store {
    db: Database,
    db_path: String,
}

impl Store {
    /// Open (creating and migrating if necessary) the store at `path`.
    pub async fn open(path: &str) -> Result<Self, SoapboxError> {
        let db = Database::open(path).await?;
        Ok(Self {
            db,
            db_path: path.to_string(),
        })
    }

    /// Path of the underlying database file (the backup manager snapshots it).
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Flush pending WAL state.
    pub async fn close(&self) -> Result<(), SoapboxError> {
        self.db.close().await
    }

    // --- Post operations ---

    pub async fn insert_post(&self, post: &ScheduledPost) -> Result<(), SoapboxError> {
        queries::posts::insert_post(&self.db, post).await
    }

    pub async fn get_post(&self, id: &PostId) -> Result<Option<ScheduledPost>, SoapboxError> {
        queries::posts::get_post(&self.db, id).await
    }

    pub async fn list_posts(
        &self,
        status: Option<PostStatus>,
    ) -> Result<Vec<ScheduledPost>, SoapboxError> {
        queries::posts::list_posts(&self.db, status).await
    }

    pub async fn due_candidates(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PostId>, SoapboxError> {
        queries::posts::due_candidates(&self.db, now, limit).await
    }

    pub async fn claim(
        &self,
        id: &PostId,
        holder: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<bool, SoapboxError> {
        queries::posts::claim(&self.db, id, holder, now, lease).await
    }

    pub async fn take_over(
        &self,
        id: &PostId,
        worker: &str,
        to: PostStatus,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<bool, SoapboxError> {
        queries::posts::take_over(&self.db, id, worker, to, now, lease).await
    }

    pub async fn set_generated(
        &self,
        id: &PostId,
        worker: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SoapboxError> {
        queries::posts::set_generated(&self.db, id, worker, content, now).await
    }

    pub async fn begin_publishing(
        &self,
        id: &PostId,
        worker: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SoapboxError> {
        queries::posts::begin_publishing(&self.db, id, worker, now).await
    }

    pub async fn mark_published(
        &self,
        id: &PostId,
        worker: &str,
        remote_post_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SoapboxError> {
        queries::posts::mark_published(&self.db, id, worker, remote_post_id, now).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn retry_later(
        &self,
        id: &PostId,
        worker: &str,
        revert_to: PostStatus,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, SoapboxError> {
        queries::posts::retry_later(&self.db, id, worker, revert_to, error, next_attempt_at, now)
            .await
    }

    pub async fn mark_failed(
        &self,
        id: &PostId,
        worker: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SoapboxError> {
        queries::posts::mark_failed(&self.db, id, worker, error, now).await
    }

    pub async fn force_fail(
        &self,
        id: &PostId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SoapboxError> {
        queries::posts::force_fail(&self.db, id, reason, now).await
    }

    pub async fn recover_stale(&self, now: DateTime<Utc>) -> Result<usize, SoapboxError> {
        queries::posts::recover_stale(&self.db, now).await
    }

    pub async fn counts_by_status(&self) -> Result<Vec<(String, i64)>, SoapboxError> {
        queries::posts::counts_by_status(&self.db).await
    }

    pub async fn report_counts(
        &self,
        today_start: DateTime<Utc>,
        tomorrow_start: DateTime<Utc>,
        day_after_start: DateTime<Utc>,
    ) -> Result<(i64, i64, i64), SoapboxError> {
        queries::posts::report_counts(&self.db, today_start, tomorrow_start, day_after_start).await
    }

    // --- Channel operations ---

    pub async fn insert_channel(
        &self,
        channel: &Channel,
        now: DateTime<Utc>,
    ) -> Result<(), SoapboxError> {
        queries::channels::insert_channel(&self.db, channel, now).await
    }

    pub async fn get_channel(&self, id: &ChannelId) -> Result<Option<Channel>, SoapboxError> {
        queries::channels::get_channel(&self.db, id).await
    }

    pub async fn list_channels(&self) -> Result<Vec<Channel>, SoapboxError> {
        queries::channels::list_channels(&self.db).await
    }

    // --- Template operations ---

    pub async fn insert_template(
        &self,
        template: &Template,
        now: DateTime<Utc>,
    ) -> Result<(), SoapboxError> {
        queries::templates::insert_template(&self.db, template, now).await
    }

    pub async fn get_template(
        &self,
        id: &TemplateId,
    ) -> Result<Option<Template>, SoapboxError> {
        queries::templates::get_template(&self.db, id).await
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>, SoapboxError> {
        queries::templates::list_templates(&self.db).await
    }

    // --- Job queue operations ---

    pub async fn push_job(
        &self,
        queue: &str,
        payload: &str,
        max_attempts: u32,
    ) -> Result<i64, SoapboxError> {
        queries::jobs::push(&self.db, queue, payload, max_attempts).await
    }

    pub async fn pull_job(
        &self,
        queue: &str,
        now: DateTime<Utc>,
        lock: Duration,
    ) -> Result<Option<Job>, SoapboxError> {
        queries::jobs::pull(&self.db, queue, now, lock).await
    }

    pub async fn complete_job(&self, id: i64) -> Result<(), SoapboxError> {
        queries::jobs::complete(&self.db, id).await
    }

    pub async fn retry_job(&self, id: i64) -> Result<(), SoapboxError> {
        queries::jobs::retry(&self.db, id).await
    }

    pub async fn queue_depth(&self, queue: &str) -> Result<i64, SoapboxError> {
        queries::jobs::depth(&self.db, queue).await
    }
}
