// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job queue with at-least-once delivery.
//!
//! Workers `pull` under a time-bounded lock, then `complete` or `retry`.
//! A worker that dies mid-job simply lets the lock expire; the job becomes
//! pullable again. Consumers must therefore be idempotent, which the post
//! state machine's CAS transitions guarantee.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::params;
use soapbox_core::SoapboxError;

use super::ts;
use crate::database::Database;

/// One queued unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub queue: String,
    pub payload: String,
    pub attempts: i64,
    pub max_attempts: i64,
}

/// Push a payload onto the named queue. Returns the job id.
pub async fn push(
    db: &Database,
    queue: &str,
    payload: &str,
    max_attempts: u32,
) -> Result<i64, SoapboxError> {
    let queue = queue.to_string();
    let payload = payload.to_string();
    let now_text = ts(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO jobs (queue, payload, max_attempts, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![queue, payload, max_attempts as i64, now_text],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Pull the next runnable job from the named queue.
///
/// Atomically selects the oldest job that is either queued or whose run
/// lock has expired, and marks it running with a fresh lock. Returns `None`
/// when nothing is runnable.
pub async fn pull(
    db: &Database,
    queue: &str,
    now: DateTime<Utc>,
    lock: Duration,
) -> Result<Option<Job>, SoapboxError> {
    let queue = queue.to_string();
    let now_text = ts(now);
    let locked_until = ts(now + chrono::Duration::from_std(lock).unwrap_or_else(|_| chrono::Duration::zero()));
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(
                    "SELECT id, queue, payload, attempts, max_attempts FROM jobs
                     WHERE queue = ?1
                       AND (status = 'queued'
                            OR (status = 'running' AND locked_until < ?2))
                     ORDER BY id ASC
                     LIMIT 1",
                )?;
                stmt.query_row(params![queue, now_text], |row| {
                    Ok(Job {
                        id: row.get(0)?,
                        queue: row.get(1)?,
                        payload: row.get(2)?,
                        attempts: row.get(3)?,
                        max_attempts: row.get(4)?,
                    })
                })
            };

            match result {
                Ok(job) => {
                    tx.execute(
                        "UPDATE jobs SET status = 'running', locked_until = ?1, updated_at = ?2
                         WHERE id = ?3",
                        params![locked_until, now_text, job.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(job))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acknowledge successful handling of a job.
pub async fn complete(db: &Database, id: i64) -> Result<(), SoapboxError> {
    let now_text = ts(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'done', locked_until = NULL, updated_at = ?1
                 WHERE id = ?2",
                params![now_text, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Report an infrastructure failure handling a job.
///
/// Increments attempts; jobs over their budget go to `dead` instead of
/// being redelivered forever.
pub async fn retry(db: &Database, id: i64) -> Result<(), SoapboxError> {
    let now_text = ts(Utc::now());
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i64, i64) = conn.query_row(
                "SELECT attempts, max_attempts FROM jobs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let next = attempts + 1;
            if next >= max_attempts {
                conn.execute(
                    "UPDATE jobs SET status = 'dead', attempts = ?1,
                     locked_until = NULL, updated_at = ?2
                     WHERE id = ?3",
                    params![next, now_text, id],
                )?;
            } else {
                conn.execute(
                    "UPDATE jobs SET status = 'queued', attempts = ?1,
                     locked_until = NULL, updated_at = ?2
                     WHERE id = ?3",
                    params![next, now_text, id],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of jobs waiting or running, for the status command.
pub async fn depth(db: &Database, queue: &str) -> Result<i64, SoapboxError> {
    let queue = queue.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM jobs
                 WHERE queue = ?1 AND status IN ('queued', 'running')",
                params![queue],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
