// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `soapbox backup` subcommand implementations.
//!
//! These call straight into the backup manager's public operations; the
//! only logic here is output formatting and the `--yes` confirmation gate
//! in front of the destructive restore.

use chrono::Utc;
use soapbox_core::SoapboxError;

use crate::BackupCommands;
use crate::app::App;

pub async fn run(app: &App, command: BackupCommands) -> Result<(), SoapboxError> {
    let manager = app.backup_manager();
    match command {
        BackupCommands::Create => {
            let record =
                tokio::task::spawn_blocking(move || manager.create_backup(Utc::now()))
                    .await
                    .map_err(join_err)??;
            println!(
                "created {} ({})",
                record.file_name,
                format_size(record.size_bytes)
            );
        }
        BackupCommands::List => {
            let records = manager.list_backups()?;
            if records.is_empty() {
                println!("no backups");
            }
            for record in records {
                println!(
                    "{}  {:>10}  {}",
                    record.file_name,
                    format_size(record.size_bytes),
                    record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
        BackupCommands::Restore { file, yes } => {
            let Some(record) = manager.find_backup(&file)? else {
                return Err(SoapboxError::Backup(format!("no such backup: {file}")));
            };
            if !yes {
                println!(
                    "restore would overwrite {}; re-run with --yes to confirm",
                    app.config.storage.database_path
                );
                return Ok(());
            }
            tokio::task::spawn_blocking(move || manager.restore(&record))
                .await
                .map_err(join_err)??;
            println!("restored from {file}");
        }
        BackupCommands::Prune => {
            let deleted = tokio::task::spawn_blocking(move || manager.prune(Utc::now()))
                .await
                .map_err(join_err)??;
            println!("pruned {} archive(s)", deleted.len());
            for record in deleted {
                println!("  removed {}", record.file_name);
            }
        }
        BackupCommands::Status => {
            let status = manager.status()?;
            println!(
                "{} archive(s), {} total",
                status.count,
                format_size(status.total_bytes)
            );
            if let Some(latest) = status.latest {
                println!(
                    "latest: {} ({})",
                    latest.file_name,
                    latest.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
}

fn join_err(e: tokio::task::JoinError) -> SoapboxError {
    SoapboxError::Internal(format!("backup task failed: {e}"))
}
