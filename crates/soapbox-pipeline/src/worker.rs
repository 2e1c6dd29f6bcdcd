// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pool draining the pipeline job queue.
//!
//! Workers are plain tokio tasks pulling from the durable queue. A job that
//! produced any pipeline-level outcome -- published, retried, failed,
//! skipped -- is completed: the outcome lives on the post row, and the
//! trigger re-dispatches whatever needs another pass. Only infrastructure
//! errors use the queue's own redelivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use soapbox_core::PipelineJob;
use soapbox_storage::{Job, Store};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::orchestrator::{Orchestrator, PIPELINE_QUEUE};

/// Pool of queue-draining worker tasks.
pub struct WorkerPool {
    store: Arc<Store>,
    orchestrator: Arc<Orchestrator>,
    workers: usize,
    poll_interval: Duration,
    job_lock: Duration,
    instance: String,
}

impl WorkerPool {
    pub fn new(
        store: Arc<Store>,
        orchestrator: Arc<Orchestrator>,
        workers: usize,
        poll_interval: Duration,
        job_lock: Duration,
        instance: String,
    ) -> Self {
        Self {
            store,
            orchestrator,
            workers,
            poll_interval,
            job_lock,
            instance,
        }
    }

    /// Spawn the worker tasks. They run until `shutdown` is cancelled.
    pub fn spawn(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        (0..self.workers)
            .map(|index| {
                let store = Arc::clone(&self.store);
                let orchestrator = Arc::clone(&self.orchestrator);
                let poll_interval = self.poll_interval;
                let job_lock = self.job_lock;
                let worker_id = format!("{}-w{index}", self.instance);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    info!(worker = %worker_id, "worker started");
                    worker_loop(store, orchestrator, worker_id, poll_interval, job_lock, shutdown)
                        .await;
                })
            })
            .collect()
    }
}

async fn worker_loop(
    store: Arc<Store>,
    orchestrator: Arc<Orchestrator>,
    worker_id: String,
    poll_interval: Duration,
    job_lock: Duration,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            info!(worker = %worker_id, "worker stopping");
            return;
        }

        match store.pull_job(PIPELINE_QUEUE, Utc::now(), job_lock).await {
            Ok(Some(job)) => {
                handle_job(&store, &orchestrator, &worker_id, job).await;
            }
            Ok(None) => {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
            Err(err) => {
                error!(worker = %worker_id, error = %err, "queue pull failed");
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }
    }
}

/// Run one job to an outcome and settle it with the queue.
pub async fn handle_job(
    store: &Store,
    orchestrator: &Orchestrator,
    worker_id: &str,
    job: Job,
) {
    let pipeline_job: PipelineJob = match serde_json::from_str(&job.payload) {
        Ok(parsed) => parsed,
        Err(err) => {
            error!(job = job.id, error = %err, "dropping malformed job payload");
            if let Err(err) = store.complete_job(job.id).await {
                error!(job = job.id, error = %err, "failed to settle malformed job");
            }
            return;
        }
    };

    match orchestrator
        .process(&pipeline_job.post_id, worker_id, Utc::now())
        .await
    {
        Ok(outcome) => {
            debug!(
                job = job.id,
                post = %pipeline_job.post_id.0,
                ?outcome,
                "job handled"
            );
            if let Err(err) = store.complete_job(job.id).await {
                error!(job = job.id, error = %err, "failed to complete job");
            }
        }
        Err(err) => {
            // Storage/infrastructure error: let the queue redeliver.
            error!(
                job = job.id,
                post = %pipeline_job.post_id.0,
                error = %err,
                "infrastructure error, job will be redelivered"
            );
            if let Err(err) = store.retry_job(job.id).await {
                error!(job = job.id, error = %err, "failed to requeue job");
            }
        }
    }
}
