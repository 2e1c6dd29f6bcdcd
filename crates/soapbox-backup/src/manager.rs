// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snapshot creation, listing, restore, and retention pruning.
//!
//! Uses rusqlite's Backup API for atomic, consistent copies that work even
//! while the database is being written to in WAL mode. An archive only
//! becomes visible once its checksum sidecar exists and the archive itself
//! is renamed into place, so an interrupted snapshot leaves nothing behind
//! that `list_backups` would report.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use soapbox_core::SoapboxError;
use tracing::{info, warn};

/// Archive filename prefix and extension; the middle encodes the creation
/// timestamp: `soapbox-20260807T123045Z.db`.
const ARCHIVE_PREFIX: &str = "soapbox-";
const ARCHIVE_EXT: &str = ".db";
const SIDECAR_EXT: &str = ".sha256";
const PARTIAL_EXT: &str = ".partial";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// One fully present backup archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

/// Retention policy: keep at most `max_count` archives, none older than
/// `max_age_days`. Either or both may be unset.
#[derive(Debug, Clone, Default)]
pub struct RetentionPolicy {
    pub max_count: Option<usize>,
    pub max_age_days: Option<u32>,
}

/// Summary for the status command.
#[derive(Debug, Clone)]
pub struct BackupStatus {
    pub count: usize,
    pub total_bytes: u64,
    pub latest: Option<BackupRecord>,
}

/// Creates, lists, restores, and prunes database snapshots.
#[derive(Debug, Clone)]
pub struct BackupManager {
    db_path: PathBuf,
    dir: PathBuf,
    retention: RetentionPolicy,
}

impl BackupManager {
    pub fn new(
        db_path: impl Into<PathBuf>,
        dir: impl Into<PathBuf>,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            dir: dir.into(),
            retention,
        }
    }

    /// Snapshot the database into a new timestamped, checksummed archive.
    ///
    /// The copy lands under a `.partial` name; the checksum sidecar is
    /// written first and the archive rename is the publish point. A crash
    /// anywhere before that final rename leaves only invisible temp files.
    pub fn create_backup(&self, now: DateTime<Utc>) -> Result<BackupRecord, SoapboxError> {
        if !self.db_path.exists() {
            return Err(storage_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("database not found: {}", self.db_path.display()),
            )));
        }
        fs::create_dir_all(&self.dir).map_err(storage_err)?;

        let file_name = format!(
            "{ARCHIVE_PREFIX}{}{ARCHIVE_EXT}",
            now.format(TIMESTAMP_FORMAT)
        );
        let archive_path = self.dir.join(&file_name);
        let archive_tmp = self.dir.join(format!("{file_name}{PARTIAL_EXT}"));
        let sidecar_path = self.dir.join(format!("{file_name}{SIDECAR_EXT}"));
        let sidecar_tmp = self.dir.join(format!("{file_name}{SIDECAR_EXT}{PARTIAL_EXT}"));

        copy_database(&self.db_path, &archive_tmp)?;

        let checksum = file_sha256(&archive_tmp)?;
        fs::write(&sidecar_tmp, format!("{checksum}  {file_name}\n")).map_err(storage_err)?;

        fs::rename(&sidecar_tmp, &sidecar_path).map_err(storage_err)?;
        fs::rename(&archive_tmp, &archive_path).map_err(storage_err)?;

        let size_bytes = fs::metadata(&archive_path).map_err(storage_err)?.len();
        info!(
            file = %file_name,
            size_bytes,
            "backup created"
        );

        Ok(BackupRecord {
            file_name,
            path: archive_path,
            size_bytes,
            checksum,
            created_at: now,
        })
    }

    /// All fully present archives, newest first.
    ///
    /// An archive without its sidecar (or vice versa) is invisible here --
    /// that pair-completeness rule is what makes a backup "fully present or
    /// absent".
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>, SoapboxError> {
        let mut records = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(storage_err(e)),
        };

        for entry in entries {
            let entry = entry.map_err(storage_err)?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !file_name.starts_with(ARCHIVE_PREFIX) || !file_name.ends_with(ARCHIVE_EXT) {
                continue;
            }
            let Some(created_at) = parse_archive_timestamp(&file_name) else {
                warn!(file = %file_name, "skipping archive with unparseable name");
                continue;
            };
            let sidecar = self.dir.join(format!("{file_name}{SIDECAR_EXT}"));
            let Ok(sidecar_content) = fs::read_to_string(&sidecar) else {
                // No sidecar: the snapshot never completed. Not a backup.
                continue;
            };
            let Some(checksum) = sidecar_content.split_whitespace().next() else {
                warn!(file = %file_name, "skipping archive with empty sidecar");
                continue;
            };
            let size_bytes = entry.metadata().map_err(storage_err)?.len();
            records.push(BackupRecord {
                file_name,
                path: entry.path(),
                size_bytes,
                checksum: checksum.to_string(),
                created_at,
            });
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Find a listed backup by its file name.
    pub fn find_backup(&self, file_name: &str) -> Result<Option<BackupRecord>, SoapboxError> {
        Ok(self
            .list_backups()?
            .into_iter()
            .find(|r| r.file_name == file_name))
    }

    /// Replace the live database with the archive's contents. Destructive;
    /// callers own the confirmation boundary.
    ///
    /// Verifies the archive's checksum and that it opens as SQLite, then
    /// takes a safety copy of the current database before overwriting it.
    pub fn restore(&self, record: &BackupRecord) -> Result<(), SoapboxError> {
        if !record.path.exists() {
            return Err(SoapboxError::Backup(format!(
                "backup file not found: {}",
                record.path.display()
            )));
        }

        let actual = file_sha256(&record.path)?;
        if actual != record.checksum {
            return Err(SoapboxError::Backup(format!(
                "checksum mismatch for {}: archive is corrupt",
                record.file_name
            )));
        }

        // Quick validation: does it open and answer a query?
        let probe = Connection::open_with_flags(
            &record.path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(|e| SoapboxError::Backup(format!("archive is not a database: {e}")))?;
        probe
            .execute_batch("SELECT 1")
            .map_err(|e| SoapboxError::Backup(format!("archive is not readable: {e}")))?;
        drop(probe);

        if self.db_path.exists() {
            let safety = self.db_path.with_extension("db.pre-restore");
            info!(path = %safety.display(), "taking pre-restore safety copy");
            copy_database(&self.db_path, &safety)?;
        }

        copy_database(&record.path, &self.db_path)?;
        info!(file = %record.file_name, "restore complete");
        Ok(())
    }

    /// Delete archives beyond the retention policy. Returns what was
    /// removed. Also sweeps stale `.partial` temp files.
    pub fn prune(&self, now: DateTime<Utc>) -> Result<Vec<BackupRecord>, SoapboxError> {
        let records = self.list_backups()?;
        let mut doomed: Vec<&BackupRecord> = Vec::new();

        if let Some(max_count) = self.retention.max_count {
            doomed.extend(records.iter().skip(max_count));
        }
        if let Some(max_age_days) = self.retention.max_age_days {
            let cutoff = now - chrono::Duration::days(i64::from(max_age_days));
            doomed.extend(records.iter().filter(|r| r.created_at < cutoff));
        }

        let mut deleted = Vec::new();
        for record in records.iter() {
            if !doomed.iter().any(|d| d.file_name == record.file_name) {
                continue;
            }
            // Archive first: once it is gone the pair no longer lists.
            fs::remove_file(&record.path).map_err(storage_err)?;
            let sidecar = self.dir.join(format!("{}{SIDECAR_EXT}", record.file_name));
            if let Err(e) = fs::remove_file(&sidecar) {
                warn!(file = %record.file_name, error = %e, "orphan sidecar left behind");
            }
            info!(file = %record.file_name, "pruned backup");
            deleted.push(record.clone());
        }

        self.sweep_partials()?;
        Ok(deleted)
    }

    /// Status summary for the CLI.
    pub fn status(&self) -> Result<BackupStatus, SoapboxError> {
        let records = self.list_backups()?;
        Ok(BackupStatus {
            count: records.len(),
            total_bytes: records.iter().map(|r| r.size_bytes).sum(),
            latest: records.into_iter().next(),
        })
    }

    /// Remove leftover `.partial` files from interrupted snapshots.
    fn sweep_partials(&self) -> Result<(), SoapboxError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(storage_err(e)),
        };
        for entry in entries {
            let entry = entry.map_err(storage_err)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(ARCHIVE_PREFIX) && name.ends_with(PARTIAL_EXT) {
                warn!(file = %name, "removing interrupted snapshot temp file");
                fs::remove_file(entry.path()).map_err(storage_err)?;
            }
        }
        Ok(())
    }
}

/// Parse the creation timestamp encoded in an archive file name.
fn parse_archive_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    let middle = file_name
        .strip_prefix(ARCHIVE_PREFIX)?
        .strip_suffix(ARCHIVE_EXT)?;
    NaiveDateTime::parse_from_str(middle, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Copy a SQLite database file using the online Backup API.
///
/// 100 pages per step, 10 ms between steps, so a live writer keeps making
/// progress during the copy.
fn copy_database(src_path: &Path, dst_path: &Path) -> Result<(), SoapboxError> {
    let src = Connection::open_with_flags(
        src_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(storage_err)?;

    let mut dst = Connection::open(dst_path).map_err(storage_err)?;

    let backup = rusqlite::backup::Backup::new(&src, &mut dst).map_err(storage_err)?;
    backup
        .run_to_completion(100, Duration::from_millis(10), None)
        .map_err(storage_err)?;
    Ok(())
}

/// Stream a file through SHA-256.
fn file_sha256(path: &Path) -> Result<String, SoapboxError> {
    let mut file = fs::File::open(path).map_err(storage_err)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(storage_err)?;
    Ok(hex::encode(hasher.finalize()))
}

fn storage_err(e: impl std::error::Error + Send + Sync + 'static) -> SoapboxError {
    SoapboxError::Storage {
        source: Box::new(e),
    }
}
