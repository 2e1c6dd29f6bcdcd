// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backup subsystem for the Soapbox database.
//!
//! Snapshots are timestamped, checksummed SQLite archives produced with the
//! online Backup API; retention pruning removes whole archives only, never
//! leaving a partially deleted pair behind.

pub mod manager;

pub use manager::{BackupManager, BackupRecord, BackupStatus, RetentionPolicy};
