//! Background clustering worker
//!
//! Single consumer of the clustering job queue. Polls for pending jobs on
//! a fixed interval, runs the landscape computation off the request path,
//! and owns the retry policy: transient failures go back to the queue with
//! an exponential-backoff due time, permanent ones (insufficient data) complete the job
//! without producing a landscape, and jobs that exhaust their attempts are
//! marked failed and announced on the event bus.

use crate::db;
use crate::engine::compute_opinion_landscape;
use crate::error::EngineError;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use voxmap_common::events::{EventBus, VoxmapEvent};
use voxmap_common::params::PARAMS;

/// Attempts before a job is marked permanently failed
const MAX_ATTEMPTS: u32 = 3;

/// Run the worker loop until the cancellation token fires
///
/// Spawned once at startup. Draining continues within a tick until the
/// queue is empty, so a burst of triggers doesn't wait one poll interval
/// per job.
pub async fn run(pool: SqlitePool, event_bus: EventBus, shutdown: CancellationToken) {
    let interval = Duration::from_millis(*PARAMS.worker_poll_interval_ms.read().unwrap());
    tracing::info!(poll_interval_ms = interval.as_millis() as u64, "Clustering worker started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Clustering worker shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {
                drain_queue(&pool, &event_bus).await;
            }
        }
    }
}

async fn drain_queue(pool: &SqlitePool, event_bus: &EventBus) {
    loop {
        let job = match db::jobs::claim_next(pool).await {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim clustering job");
                return;
            }
        };

        process_job(pool, event_bus, &job).await;
    }
}

/// Run one claimed job to a terminal or retryable state
async fn process_job(pool: &SqlitePool, event_bus: &EventBus, job: &db::jobs::ClusteringJob) {
    tracing::info!(
        job_id = %job.id,
        poll_id = %job.poll_id,
        attempt = job.attempts + 1,
        "Processing clustering job"
    );

    let timeout = Duration::from_secs(*PARAMS.compute_timeout_secs.read().unwrap());
    let outcome = tokio::time::timeout(
        timeout,
        compute_opinion_landscape(pool, event_bus, job.poll_id),
    )
    .await;

    let error = match outcome {
        Ok(Ok(_)) => {
            if let Err(e) = db::jobs::complete(pool, job.id).await {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark job completed");
            }
            return;
        }
        Ok(Err(EngineError::InsufficientData { reason, .. })) => {
            // Not an error condition: the poll shrank below the floors
            // between trigger and execution. Complete without retry.
            tracing::info!(
                job_id = %job.id,
                poll_id = %job.poll_id,
                reason = %reason,
                "Poll no longer eligible, completing job without landscape"
            );
            if let Err(e) = db::jobs::complete(pool, job.id).await {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark job completed");
            }
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("computation exceeded {}s timeout", timeout.as_secs()),
    };

    if job.attempts + 1 < MAX_ATTEMPTS {
        tracing::warn!(
            job_id = %job.id,
            poll_id = %job.poll_id,
            attempt = job.attempts + 1,
            error = %error,
            "Clustering job failed, requeueing"
        );
        // Exponential backoff is persisted on the job, not slept here: one
        // poll's retry delay must not stall other polls' pending work
        let not_before = chrono::Utc::now()
            + chrono::Duration::from_std(backoff_delay(job.attempts))
                .unwrap_or_else(|_| chrono::Duration::seconds(30));
        if let Err(e) = db::jobs::retry(pool, job.id, &error, not_before).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to requeue job");
        }
    } else {
        tracing::error!(
            job_id = %job.id,
            poll_id = %job.poll_id,
            attempts = job.attempts + 1,
            error = %error,
            "Clustering job failed permanently"
        );
        if let Err(e) = db::jobs::fail(pool, job.id, &error).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to mark job failed");
        }
        event_bus.emit_lossy(VoxmapEvent::LandscapeFailed {
            poll_id: job.poll_id,
            error,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// 1s, 2s, 4s, ... capped at 30s
fn backoff_delay(attempts: u32) -> Duration {
    let secs = 1u64 << attempts.min(5);
    Duration::from_secs(secs.min(30))
}
