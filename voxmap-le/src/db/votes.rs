//! Vote store access
//!
//! Votes are append-only: uniquely keyed by (voter, statement), never
//! mutated once written. Everything downstream (matrix, weights, trigger)
//! only reads.

use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// One vote record: value is -1 (disagree), 0 (pass) or 1 (agree)
#[derive(Debug, Clone)]
pub struct Vote {
    pub voter_id: Uuid,
    pub statement_id: Uuid,
    pub value: i32,
}

/// Record a vote; duplicate (voter, statement) pairs are ignored (immutable)
///
/// Returns true if a new row was written.
pub async fn record_vote(
    pool: &SqlitePool,
    voter_id: Uuid,
    statement_id: Uuid,
    value: i32,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO votes (voter_id, statement_id, value, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(voter_id.to_string())
    .bind(statement_id.to_string())
    .bind(value)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// List all votes on the given statements
pub async fn list_votes(pool: &SqlitePool, statement_ids: &[Uuid]) -> Result<Vec<Vote>> {
    if statement_ids.is_empty() {
        return Ok(Vec::new());
    }

    // sqlx sqlite has no array binds; build the placeholder list
    let placeholders = vec!["?"; statement_ids.len()].join(", ");
    let sql = format!(
        "SELECT voter_id, statement_id, value FROM votes WHERE statement_id IN ({})",
        placeholders
    );

    let mut query = sqlx::query(&sql);
    for id in statement_ids {
        query = query.bind(id.to_string());
    }

    let rows = query.fetch_all(pool).await?;
    let mut votes = Vec::with_capacity(rows.len());
    for row in rows {
        let voter_id: String = row.get("voter_id");
        let statement_id: String = row.get("statement_id");
        votes.push(Vote {
            voter_id: Uuid::parse_str(&voter_id)?,
            statement_id: Uuid::parse_str(&statement_id)?,
            value: row.get::<i64, _>("value") as i32,
        });
    }
    Ok(votes)
}

/// Count distinct voters who cast at least one vote on an approved statement
/// in the poll (eligibility floor check — cheap count query only)
///
/// Only approved statements count: the opinion matrix is built from approved
/// statements, so a voter whose votes are all on unapproved ones contributes
/// no matrix row and must not satisfy the eligibility floor.
pub async fn count_distinct_voters(pool: &SqlitePool, poll_id: Uuid) -> Result<usize> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT v.voter_id)
        FROM votes v
        JOIN statements s ON s.id = v.statement_id
        WHERE s.poll_id = ? AND s.approved = 1
        "#,
    )
    .bind(poll_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count as usize)
}

/// Total votes across the poll's approved statements (milestone trigger input)
pub async fn count_poll_votes(pool: &SqlitePool, poll_id: Uuid) -> Result<usize> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM votes v
        JOIN statements s ON s.id = v.statement_id
        WHERE s.poll_id = ? AND s.approved = 1
        "#,
    )
    .bind(poll_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count as usize)
}

/// Votes a voter has cast on the poll's approved statements (background
/// trigger input; approved-only keeps batch-boundary math aligned with the
/// approved-statement batches the ordering service serves)
pub async fn count_voter_votes(pool: &SqlitePool, poll_id: Uuid, voter_id: Uuid) -> Result<usize> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM votes v
        JOIN statements s ON s.id = v.statement_id
        WHERE s.poll_id = ? AND v.voter_id = ? AND s.approved = 1
        "#,
    )
    .bind(poll_id.to_string())
    .bind(voter_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count as usize)
}

/// Per-statement vote aggregates used by the weighting service
#[derive(Debug, Clone, Default)]
pub struct StatementVoteStats {
    pub total: usize,
    pub passes: usize,
}

impl StatementVoteStats {
    /// Historical Pass proportion, 0.0 when unvoted
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passes as f64 / self.total as f64
        }
    }
}

/// Vote totals and pass counts for one statement
pub async fn statement_vote_stats(
    pool: &SqlitePool,
    statement_id: Uuid,
) -> Result<StatementVoteStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, SUM(CASE WHEN value = 0 THEN 1 ELSE 0 END) AS passes
         FROM votes WHERE statement_id = ?",
    )
    .bind(statement_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(StatementVoteStats {
        total: row.get::<i64, _>("total") as usize,
        passes: row.get::<Option<i64>, _>("passes").unwrap_or(0) as usize,
    })
}
