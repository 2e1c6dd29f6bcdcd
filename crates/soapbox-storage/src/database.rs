// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes -- the
//! only other connections ever opened against the file are the read-only
//! ones the backup manager uses.

use soapbox_core::SoapboxError;
use tracing::debug;

/// Handle to the single-writer SQLite database.
///
/// Migrations run once during [`Database::open`], on a short-lived blocking
/// connection, before the async writer thread takes the file over.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if necessary) the database at `path`, apply PRAGMAs,
    /// and run any pending migrations.
    pub async fn open(path: &str) -> Result<Self, SoapboxError> {
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), SoapboxError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(map_sql_err)?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
            .map_err(map_sql_err)?;
            crate::migrations::run_migrations(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| SoapboxError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_sql_err)?;
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying single-writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Flush the WAL into the main database file.
    pub async fn close(&self) -> Result<(), SoapboxError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// Map a tokio-rusqlite error into the storage error variant.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> SoapboxError {
    SoapboxError::Storage {
        source: Box::new(e),
    }
}

/// Map a plain rusqlite error into the storage error variant.
pub(crate) fn map_sql_err(e: rusqlite::Error) -> SoapboxError {
    SoapboxError::Storage {
        source: Box::new(e),
    }
}
