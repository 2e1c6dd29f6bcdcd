// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled-post lifecycle operations.
//!
//! Every state transition here is a compare-and-set UPDATE: the WHERE clause
//! names the expected current status (and, past the claim, the expected
//! lease holder), and the caller learns from the affected-row count whether
//! it won. That single primitive is what makes concurrent workers safe --
//! there is no other locking anywhere in the pipeline.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::params;
use soapbox_core::{PostId, PostStatus, ScheduledPost, SoapboxError};

use super::{parse_opt_ts, parse_ts, ts};
use crate::database::Database;

const POST_COLUMNS: &str = "id, channel_id, template_id, due_at, context, status, attempts, \
     last_error, manual_content, generated_content, remote_post_id, \
     lease_holder, lease_expires_at, next_attempt_at, created_at, updated_at";

fn row_to_post(row: &rusqlite::Row<'_>) -> Result<ScheduledPost, rusqlite::Error> {
    let context_json: String = row.get(4)?;
    let context: BTreeMap<String, String> = serde_json::from_str(&context_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let status_text: String = row.get(5)?;
    let status = PostStatus::from_str(&status_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let due_at: String = row.get(3)?;
    let lease_expires_at: Option<String> = row.get(12)?;
    let next_attempt_at: Option<String> = row.get(13)?;
    let created_at: String = row.get(14)?;
    let updated_at: String = row.get(15)?;
    let attempts: i64 = row.get(6)?;

    Ok(ScheduledPost {
        id: PostId(row.get(0)?),
        channel_id: soapbox_core::ChannelId(row.get(1)?),
        template_id: soapbox_core::TemplateId(row.get(2)?),
        due_at: parse_ts(&due_at)?,
        context,
        status,
        attempts: attempts as u32,
        last_error: row.get(7)?,
        manual_content: row.get(8)?,
        generated_content: row.get(9)?,
        remote_post_id: row.get(10)?,
        lease_holder: row.get(11)?,
        lease_expires_at: parse_opt_ts(lease_expires_at)?,
        next_attempt_at: parse_opt_ts(next_attempt_at)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

/// Insert a new scheduled post.
pub async fn insert_post(db: &Database, post: &ScheduledPost) -> Result<(), SoapboxError> {
    let post = post.clone();
    db.connection()
        .call(move |conn| {
            let context_json = serde_json::to_string(&post.context).map_err(|e| {
                rusqlite::Error::ToSqlConversionFailure(Box::new(e))
            })?;
            conn.execute(
                "INSERT INTO posts (id, channel_id, template_id, due_at, context, status, \
                 attempts, last_error, manual_content, generated_content, remote_post_id, \
                 lease_holder, lease_expires_at, next_attempt_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    post.id.0,
                    post.channel_id.0,
                    post.template_id.0,
                    ts(post.due_at),
                    context_json,
                    post.status.to_string(),
                    post.attempts as i64,
                    post.last_error,
                    post.manual_content,
                    post.generated_content,
                    post.remote_post_id,
                    post.lease_holder,
                    post.lease_expires_at.map(ts),
                    post.next_attempt_at.map(ts),
                    ts(post.created_at),
                    ts(post.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a post by id.
pub async fn get_post(db: &Database, id: &PostId) -> Result<Option<ScheduledPost>, SoapboxError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"))?;
            let result = stmt.query_row(params![id], row_to_post);
            match result {
                Ok(post) => Ok(Some(post)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List posts, optionally filtered by status, newest due first.
pub async fn list_posts(
    db: &Database,
    status: Option<PostStatus>,
) -> Result<Vec<ScheduledPost>, SoapboxError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut posts = Vec::new();
            match &status {
                Some(filter) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {POST_COLUMNS} FROM posts WHERE status = ?1 ORDER BY due_at DESC"
                    ))?;
                    let rows = stmt.query_map(params![filter], row_to_post)?;
                    for row in rows {
                        posts.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {POST_COLUMNS} FROM posts ORDER BY due_at DESC"
                    ))?;
                    let rows = stmt.query_map([], row_to_post)?;
                    for row in rows {
                        posts.push(row?);
                    }
                }
            }
            Ok(posts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Select ids of posts eligible for claiming right now.
///
/// A post is eligible when it is due, not gated by a backoff delay, and its
/// channel is active with a non-empty credential. Claiming itself is a
/// separate CAS -- two schedulers may see the same candidate but only one
/// claim wins.
pub async fn due_candidates(
    db: &Database,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<PostId>, SoapboxError> {
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id FROM posts p
                 JOIN channels c ON c.id = p.channel_id
                 WHERE p.status IN ('pending', 'generated')
                   AND p.due_at <= ?1
                   AND (p.next_attempt_at IS NULL OR p.next_attempt_at <= ?1)
                   AND (p.lease_holder IS NULL OR p.lease_expires_at < ?1)
                   AND c.active = 1
                   AND c.credential IS NOT NULL
                   AND c.credential != ''
                 ORDER BY p.due_at ASC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![now_text, limit as i64], |row| {
                Ok(PostId(row.get(0)?))
            })?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            Ok(ids)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Atomically claim a post for processing.
///
/// Succeeds only from `pending` or `generated`; increments the attempt
/// counter as part of the same statement. Returns false when another
/// claimer got there first (or the post moved on).
pub async fn claim(
    db: &Database,
    id: &PostId,
    holder: &str,
    now: DateTime<Utc>,
    lease: Duration,
) -> Result<bool, SoapboxError> {
    let id = id.0.clone();
    let holder = holder.to_string();
    let lease_expires = ts(now + chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::zero()));
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET status = 'claimed', lease_holder = ?1,
                 lease_expires_at = ?2, attempts = attempts + 1, updated_at = ?3
                 WHERE id = ?4 AND status IN ('pending', 'generated')",
                params![holder, lease_expires, now_text, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Take over a claimed post, moving it into `generating` or (when content
/// already exists) straight to `generated`.
///
/// The status CAS makes duplicate queue deliveries race safely: exactly one
/// worker moves the post out of `claimed`.
pub async fn take_over(
    db: &Database,
    id: &PostId,
    worker: &str,
    to: PostStatus,
    now: DateTime<Utc>,
    lease: Duration,
) -> Result<bool, SoapboxError> {
    debug_assert!(matches!(to, PostStatus::Generating | PostStatus::Generated));
    let id = id.0.clone();
    let worker = worker.to_string();
    let to = to.to_string();
    let lease_expires = ts(now + chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::zero()));
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET status = ?1, lease_holder = ?2,
                 lease_expires_at = ?3, updated_at = ?4
                 WHERE id = ?5 AND status = 'claimed'",
                params![to, worker, lease_expires, now_text, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist generated content and advance `generating -> generated`.
///
/// Content is durable before publishing starts, so a crash between the two
/// steps resumes at publish without a second provider call.
pub async fn set_generated(
    db: &Database,
    id: &PostId,
    worker: &str,
    content: &str,
    now: DateTime<Utc>,
) -> Result<bool, SoapboxError> {
    let id = id.0.clone();
    let worker = worker.to_string();
    let content = content.to_string();
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET generated_content = ?1, status = 'generated', updated_at = ?2
                 WHERE id = ?3 AND status = 'generating' AND lease_holder = ?4",
                params![content, now_text, id, worker],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Advance `generated -> publishing` under the held lease.
pub async fn begin_publishing(
    db: &Database,
    id: &PostId,
    worker: &str,
    now: DateTime<Utc>,
) -> Result<bool, SoapboxError> {
    let id = id.0.clone();
    let worker = worker.to_string();
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET status = 'publishing', updated_at = ?1
                 WHERE id = ?2 AND status = 'generated' AND lease_holder = ?3",
                params![now_text, id, worker],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Terminal success: attach the remote post id and release the lease.
///
/// `remote_post_id` and `status = published` are written in one statement,
/// which is what keeps the "remote id set iff published" invariant intact
/// under crashes.
pub async fn mark_published(
    db: &Database,
    id: &PostId,
    worker: &str,
    remote_post_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, SoapboxError> {
    let id = id.0.clone();
    let worker = worker.to_string();
    let remote = remote_post_id.to_string();
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET status = 'published', remote_post_id = ?1,
                 last_error = NULL, lease_holder = NULL, lease_expires_at = NULL,
                 next_attempt_at = NULL, updated_at = ?2
                 WHERE id = ?3 AND status = 'publishing' AND lease_holder = ?4",
                params![remote, now_text, id, worker],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Release the lease and reschedule after a retryable failure.
///
/// `revert_to` is `pending` for generation failures and `generated` for
/// publish failures (the content survives). The attempt counter is NOT
/// touched here -- it was already incremented by the claim.
pub async fn retry_later(
    db: &Database,
    id: &PostId,
    worker: &str,
    revert_to: PostStatus,
    error: &str,
    next_attempt_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<bool, SoapboxError> {
    debug_assert!(matches!(revert_to, PostStatus::Pending | PostStatus::Generated));
    let id = id.0.clone();
    let worker = worker.to_string();
    let revert = revert_to.to_string();
    let error = error.to_string();
    let next_text = ts(next_attempt_at);
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET status = ?1, last_error = ?2, next_attempt_at = ?3,
                 lease_holder = NULL, lease_expires_at = NULL, updated_at = ?4
                 WHERE id = ?5 AND lease_holder = ?6
                   AND status IN ('claimed', 'generating', 'generated', 'publishing')",
                params![revert, error, next_text, now_text, id, worker],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Terminal failure under the held lease. The error text and attempt count
/// stay behind for operator inspection.
pub async fn mark_failed(
    db: &Database,
    id: &PostId,
    worker: &str,
    error: &str,
    now: DateTime<Utc>,
) -> Result<bool, SoapboxError> {
    let id = id.0.clone();
    let worker = worker.to_string();
    let error = error.to_string();
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET status = 'failed', last_error = ?1,
                 lease_holder = NULL, lease_expires_at = NULL,
                 next_attempt_at = NULL, updated_at = ?2
                 WHERE id = ?3 AND lease_holder = ?4
                   AND status NOT IN ('published', 'failed')",
                params![error, now_text, id, worker],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Operator-forced terminal failure, valid from any non-terminal state,
/// lease or no lease. Workers notice before their next step.
pub async fn force_fail(
    db: &Database,
    id: &PostId,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<bool, SoapboxError> {
    let id = id.0.clone();
    let reason = reason.to_string();
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET status = 'failed', last_error = ?1,
                 lease_holder = NULL, lease_expires_at = NULL,
                 next_attempt_at = NULL, updated_at = ?2
                 WHERE id = ?3 AND status NOT IN ('published', 'failed')",
                params![reason, now_text, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Sweep expired leases back to claimable statuses.
///
/// `claimed`/`generating` revert to `pending`; `publishing` reverts to
/// `generated` so the already-persisted content is reused; a `generated`
/// row whose worker died before starting the publish just sheds its lease.
/// This is what makes a worker crash non-fatal: the post is simply picked
/// up again.
pub async fn recover_stale(db: &Database, now: DateTime<Utc>) -> Result<usize, SoapboxError> {
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let reverted_pending = tx.execute(
                "UPDATE posts SET status = 'pending', lease_holder = NULL,
                 lease_expires_at = NULL, updated_at = ?1
                 WHERE status IN ('claimed', 'generating')
                   AND lease_expires_at IS NOT NULL AND lease_expires_at < ?1",
                params![now_text],
            )?;
            let reverted_generated = tx.execute(
                "UPDATE posts SET status = 'generated', lease_holder = NULL,
                 lease_expires_at = NULL, updated_at = ?1
                 WHERE status = 'publishing'
                   AND lease_expires_at IS NOT NULL AND lease_expires_at < ?1",
                params![now_text],
            )?;
            let released = tx.execute(
                "UPDATE posts SET lease_holder = NULL,
                 lease_expires_at = NULL, updated_at = ?1
                 WHERE status = 'generated' AND lease_holder IS NOT NULL
                   AND lease_expires_at IS NOT NULL AND lease_expires_at < ?1",
                params![now_text],
            )?;
            tx.commit()?;
            Ok(reverted_pending + reverted_generated + released)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Post counts per status, for the status command.
pub async fn counts_by_status(db: &Database) -> Result<Vec<(String, i64)>, SoapboxError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM posts GROUP BY status ORDER BY status",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let mut counts = Vec::new();
            for row in rows {
                counts.push(row?);
            }
            Ok(counts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Counts backing the daily report: posts published today, posts coming due
/// tomorrow, posts failed today.
pub async fn report_counts(
    db: &Database,
    today_start: DateTime<Utc>,
    tomorrow_start: DateTime<Utc>,
    day_after_start: DateTime<Utc>,
) -> Result<(i64, i64, i64), SoapboxError> {
    let today = ts(today_start);
    let tomorrow = ts(tomorrow_start);
    let day_after = ts(day_after_start);
    db.connection()
        .call(move |conn| {
            let published: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE status = 'published'
                 AND updated_at >= ?1 AND updated_at < ?2",
                params![today, tomorrow],
                |row| row.get(0),
            )?;
            let due: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posts
                 WHERE due_at >= ?1 AND due_at < ?2
                 AND status NOT IN ('published', 'failed')",
                params![tomorrow, day_after],
                |row| row.get(0),
            )?;
            let failed: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE status = 'failed'
                 AND updated_at >= ?1 AND updated_at < ?2",
                params![today, tomorrow],
                |row| row.get(0),
            )?;
            Ok((published, due, failed))
        })
        .await
        .map_err(crate::database::map_tr_err)
}
