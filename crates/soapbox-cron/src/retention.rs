// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The backup tick: snapshot on a cron schedule, then prune.
//!
//! Runs on a much coarser cadence than the pipeline tick. The schedule is
//! evaluated against an injected clock, so tests drive it with synthetic
//! times.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use croner::Cron;
use soapbox_backup::{BackupManager, BackupRecord};
use soapbox_core::SoapboxError;
use tracing::{error, info};

/// Fires the backup manager whenever the cron schedule has matched since
/// the previous run.
#[derive(Debug)]
pub struct BackupTicker {
    manager: BackupManager,
    schedule: Cron,
    last_run: Mutex<DateTime<Utc>>,
}

impl BackupTicker {
    /// Parse the schedule and anchor the ticker at `now`, so the first
    /// snapshot happens at the next scheduled time, not immediately.
    pub fn new(
        manager: BackupManager,
        schedule: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, SoapboxError> {
        let schedule = Cron::new(schedule)
            .parse()
            .map_err(|e| SoapboxError::Config(format!("invalid backup schedule `{schedule}`: {e}")))?;
        Ok(Self {
            manager,
            schedule,
            last_run: Mutex::new(now),
        })
    }

    /// Snapshot + prune when the schedule has come due; `None` otherwise.
    ///
    /// The snapshot itself is blocking file I/O and runs on the blocking
    /// pool.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Option<BackupRecord>, SoapboxError> {
        let due = {
            let mut last_run = self
                .last_run
                .lock()
                .map_err(|_| SoapboxError::Internal("backup ticker lock poisoned".into()))?;
            let next = self
                .schedule
                .find_next_occurrence(&*last_run, false)
                .map_err(|e| SoapboxError::Internal(format!("schedule evaluation failed: {e}")))?;
            if next <= now {
                *last_run = now;
                true
            } else {
                false
            }
        };
        if !due {
            return Ok(None);
        }

        let manager = self.manager.clone();
        let record = tokio::task::spawn_blocking(move || -> Result<BackupRecord, SoapboxError> {
            let record = manager.create_backup(now)?;
            match manager.prune(now) {
                Ok(deleted) if !deleted.is_empty() => {
                    info!(deleted = deleted.len(), "retention pruning removed old backups");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "retention pruning failed"),
            }
            Ok(record)
        })
        .await
        .map_err(|e| SoapboxError::Internal(format!("backup task failed: {e}")))??;

        info!(file = %record.file_name, "scheduled backup complete");
        Ok(Some(record))
    }
}
