// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `soapbox status` command: daily report, post counts, queue depth,
//! provider connectivity, backup summary.

use std::str::FromStr;

use chrono::Utc;
use soapbox_core::{PostStatus, SoapboxError};
use soapbox_pipeline::{PIPELINE_QUEUE, daily_report};

use crate::app::App;

pub async fn run(app: &App) -> Result<(), SoapboxError> {
    let now = Utc::now();

    let report = daily_report(&app.store, now).await?;
    println!("Daily report for {}:", report.date);
    println!("  published today:    {}", report.published_today);
    println!("  scheduled tomorrow: {}", report.scheduled_tomorrow);
    println!("  failed today:       {}", report.failed_today);

    let counts = app.store.counts_by_status().await?;
    println!("Posts by status:");
    if counts.is_empty() {
        println!("  (none)");
    }
    for (status, count) in counts {
        let label = PostStatus::from_str(&status)
            .map(|s| s.label())
            .unwrap_or("Unknown");
        println!("  {label:<20} {count}");
    }

    let depth = app.store.queue_depth(PIPELINE_QUEUE).await?;
    println!("Queue depth: {depth}");

    let cache = app.cache.stats();
    println!(
        "Cache ({}): {} entries, {} hits, {} misses",
        cache.backend, cache.entries, cache.hits, cache.misses
    );

    let provider_ok = app.generator.test_connection().await;
    println!(
        "Provider connection: {}",
        if provider_ok { "ok" } else { "failed" }
    );

    let channels = app.store.list_channels().await?;
    println!("Channels:");
    if channels.is_empty() {
        println!("  (none)");
    }
    for channel in channels {
        let verdict = if !channel.active {
            "inactive".to_string()
        } else {
            match app.publisher.verify_credential(&channel).await {
                Ok(()) => "credential ok".to_string(),
                Err(err) => format!("credential check failed: {err}"),
            }
        };
        println!("  {:<20} {verdict}", channel.name);
    }

    let backups = app.backup_manager().status()?;
    println!("Backups: {} archive(s)", backups.count);
    if let Some(latest) = backups.latest {
        println!("  latest: {}", latest.file_name);
    }

    Ok(())
}
