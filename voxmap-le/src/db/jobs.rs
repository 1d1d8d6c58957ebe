//! Clustering job queue
//!
//! One landscape computation per poll at a time: enqueue is deduplicated
//! against pending and running jobs for the same poll, and the worker claims
//! jobs one at a time. Computation never runs inline on the request path.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// A claimed clustering job
#[derive(Debug, Clone)]
pub struct ClusteringJob {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub attempts: u32,
}

/// Enqueue a recomputation job unless one is already pending or running
/// for this poll. Returns the job id if a new job was created.
pub async fn enqueue(pool: &SqlitePool, poll_id: Uuid) -> Result<Option<Uuid>> {
    let now = Utc::now().to_rfc3339();
    let job_id = Uuid::new_v4();

    // Dedup and insert in one statement so concurrent enqueues can't both
    // slip past the check
    let result = sqlx::query(
        r#"
        INSERT INTO clustering_jobs (id, poll_id, status, attempts, enqueued_at, updated_at)
        SELECT ?, ?, 'pending', 0, ?, ?
        WHERE NOT EXISTS (
            SELECT 1 FROM clustering_jobs
            WHERE poll_id = ? AND status IN ('pending', 'running')
        )
        "#,
    )
    .bind(job_id.to_string())
    .bind(poll_id.to_string())
    .bind(&now)
    .bind(&now)
    .bind(poll_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        Ok(Some(job_id))
    } else {
        tracing::debug!(poll_id = %poll_id, "Clustering job already queued, skipping");
        Ok(None)
    }
}

/// Claim the oldest due pending job, marking it running
///
/// A job whose `next_attempt_at` lies in the future is backing off and is
/// skipped; the consumer never sleeps on one poll's retry while other
/// polls have due work.
pub async fn claim_next(pool: &SqlitePool) -> Result<Option<ClusteringJob>> {
    let now = Utc::now().to_rfc3339();
    let row = sqlx::query(
        r#"
        UPDATE clustering_jobs
        SET status = 'running', updated_at = ?
        WHERE id = (
            SELECT id FROM clustering_jobs
            WHERE status = 'pending'
              AND (next_attempt_at IS NULL OR next_attempt_at <= ?)
            ORDER BY enqueued_at
            LIMIT 1
        )
        RETURNING id, poll_id, attempts
        "#,
    )
    .bind(&now)
    .bind(&now)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id: String = row.get("id");
    let poll_id: String = row.get("poll_id");
    Ok(Some(ClusteringJob {
        id: Uuid::parse_str(&id)?,
        poll_id: Uuid::parse_str(&poll_id)?,
        attempts: row.get::<i64, _>("attempts") as u32,
    }))
}

/// Mark a job completed
pub async fn complete(pool: &SqlitePool, job_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE clustering_jobs SET status = 'completed', updated_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(job_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Return a failed attempt to the queue for retry, not claimable again
/// before `not_before`
pub async fn retry(
    pool: &SqlitePool,
    job_id: Uuid,
    error: &str,
    not_before: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE clustering_jobs SET status = 'pending', attempts = attempts + 1, last_error = ?, next_attempt_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(error)
    .bind(not_before.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .bind(job_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a job permanently failed for operator visibility (never silently
/// dropped)
pub async fn fail(pool: &SqlitePool, job_id: Uuid, error: &str) -> Result<()> {
    sqlx::query(
        "UPDATE clustering_jobs SET status = 'failed', attempts = attempts + 1, last_error = ?, updated_at = ? WHERE id = ?",
    )
    .bind(error)
    .bind(Utc::now().to_rfc3339())
    .bind(job_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Job status for a poll, newest first (diagnostic surface)
pub async fn poll_status(pool: &SqlitePool, poll_id: Uuid) -> Result<Vec<(String, u32, Option<String>)>> {
    let rows = sqlx::query(
        "SELECT status, attempts, last_error FROM clustering_jobs WHERE poll_id = ? ORDER BY enqueued_at DESC",
    )
    .bind(poll_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.get::<String, _>("status"),
                row.get::<i64, _>("attempts") as u32,
                row.get::<Option<String>, _>("last_error"),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Single-connection pool: each new in-memory connection would otherwise
    /// get its own empty database
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        crate::db::init_tables(&pool).await.expect("Failed to init tables");
        pool
    }

    #[tokio::test]
    async fn tc_u_jobs_backing_off_job_does_not_block_other_polls() {
        let pool = test_pool().await;
        let poll_a = Uuid::from_u128(1);
        let poll_b = Uuid::from_u128(2);

        let job_a = enqueue(&pool, poll_a).await.unwrap().unwrap();

        // Poll A's job fails and backs off into the future
        let claimed = claim_next(&pool).await.unwrap().unwrap();
        assert_eq!(claimed.id, job_a);
        retry(&pool, job_a, "transient", Utc::now() + Duration::seconds(30))
            .await
            .unwrap();

        // Poll B's job enqueued afterward is claimed immediately; the
        // backing-off job is skipped, not waited on
        let job_b = enqueue(&pool, poll_b).await.unwrap().unwrap();
        let claimed = claim_next(&pool).await.unwrap().unwrap();
        assert_eq!(claimed.id, job_b);
        assert_eq!(claimed.poll_id, poll_b);

        // Poll A's job stays invisible until due
        assert!(claim_next(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tc_u_jobs_retry_becomes_claimable_once_due() {
        let pool = test_pool().await;
        let poll_id = Uuid::from_u128(3);

        let job_id = enqueue(&pool, poll_id).await.unwrap().unwrap();
        claim_next(&pool).await.unwrap().unwrap();
        retry(&pool, job_id, "transient", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        let claimed = claim_next(&pool).await.unwrap().unwrap();
        assert_eq!(claimed.id, job_id);
        assert_eq!(claimed.attempts, 1);
    }
}
