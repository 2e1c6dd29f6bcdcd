// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The serve loop: worker pool, pipeline tick, backup tick, daily report.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use soapbox_core::SoapboxError;
use soapbox_cron::{BackupTicker, Trigger};
use soapbox_pipeline::{PIPELINE_QUEUE, WorkerPool, daily_report, worker};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::app::App;

/// Run the automation until ctrl-c.
pub async fn run(app: App) -> Result<(), SoapboxError> {
    let trigger = Trigger::new(
        Arc::clone(&app.orchestrator),
        Arc::clone(&app.store),
        app.config.trigger.batch_size,
        app.config.pipeline.queue_max_attempts,
    );

    let backup_ticker = if app.config.backup.enabled {
        Some(BackupTicker::new(
            app.backup_manager(),
            &app.config.backup.schedule,
            Utc::now(),
        )?)
    } else {
        None
    };

    let shutdown = CancellationToken::new();
    let pool = WorkerPool::new(
        Arc::clone(&app.store),
        Arc::clone(&app.orchestrator),
        app.config.pipeline.workers,
        Duration::from_millis(app.config.pipeline.poll_interval_ms),
        Duration::from_secs(app.config.pipeline.lease_secs),
        app.config.instance.name.clone(),
    );
    let handles = pool.spawn(shutdown.clone());

    let mut interval = tokio::time::interval(Duration::from_secs(app.config.trigger.tick_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_report_date: Option<NaiveDate> = None;

    info!(
        workers = app.config.pipeline.workers,
        tick_secs = app.config.trigger.tick_secs,
        "serve loop started"
    );

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    error!(error = %err, "signal listener failed");
                }
                info!("shutdown requested");
                break;
            }
            _ = interval.tick() => {
                let now = Utc::now();

                if let Err(err) = trigger.tick(now).await {
                    error!(error = %err, "pipeline tick failed");
                }

                if let Some(ticker) = &backup_ticker
                    && let Err(err) = ticker.tick(now).await
                {
                    error!(error = %err, "backup tick failed");
                }

                let today = now.date_naive();
                if last_report_date != Some(today) {
                    match daily_report(&app.store, now).await {
                        Ok(report) => {
                            info!(
                                published_today = report.published_today,
                                scheduled_tomorrow = report.scheduled_tomorrow,
                                failed_today = report.failed_today,
                                "daily report"
                            );
                            last_report_date = Some(today);
                        }
                        Err(err) => error!(error = %err, "daily report failed"),
                    }
                }
            }
        }
    }

    shutdown.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    app.store.close().await?;
    info!("serve loop stopped");
    Ok(())
}

/// One synchronous pass for `run-now`: tick once, then drain the queue
/// inline instead of leaving the jobs to a worker pool.
pub async fn run_one_pass(app: &App) -> Result<(), SoapboxError> {
    let trigger = Trigger::new(
        Arc::clone(&app.orchestrator),
        Arc::clone(&app.store),
        app.config.trigger.batch_size,
        app.config.pipeline.queue_max_attempts,
    );

    let summary = trigger.tick(Utc::now()).await?;
    println!(
        "dispatched {} post(s), recovered {} from stale leases",
        summary.dispatched, summary.recovered
    );

    let worker_id = format!("{}-cli", app.config.instance.name);
    let job_lock = Duration::from_secs(app.config.pipeline.lease_secs);
    let mut processed = 0;
    while let Some(job) = app
        .store
        .pull_job(PIPELINE_QUEUE, Utc::now(), job_lock)
        .await?
    {
        worker::handle_job(&app.store, &app.orchestrator, &worker_id, job).await;
        processed += 1;
    }
    println!("processed {processed} job(s)");
    Ok(())
}
