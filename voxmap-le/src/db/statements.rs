//! Statement store access
//!
//! The statement table is owned by the moderation service; the engine reads
//! approved statements and their creation times, plus the one write it does
//! perform: flipping `approved` (which obligates a poll-wide weight cache
//! invalidation, see the weighting service).

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Approved statement surface consumed by the engine
#[derive(Debug, Clone)]
pub struct ApprovedStatement {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// List approved statements for a poll in creation order
///
/// Creation order doubles as the Sequential ordering strategy's output.
pub async fn list_approved_statements(
    pool: &SqlitePool,
    poll_id: Uuid,
) -> Result<Vec<ApprovedStatement>> {
    let rows = sqlx::query(
        "SELECT id, created_at FROM statements WHERE poll_id = ? AND approved = 1 ORDER BY created_at, id",
    )
    .bind(poll_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut statements = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get("id");
        let created_at: String = row.get("created_at");
        statements.push(ApprovedStatement {
            id: Uuid::parse_str(&id)?,
            created_at: created_at.parse::<DateTime<Utc>>()?,
        });
    }
    Ok(statements)
}

/// Count approved statements for a poll (eligibility floor check)
pub async fn count_approved_statements(pool: &SqlitePool, poll_id: Uuid) -> Result<usize> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM statements WHERE poll_id = ? AND approved = 1")
            .bind(poll_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count as usize)
}

/// Insert a statement (test/seeding surface; moderation owns this in production)
pub async fn insert_statement(
    pool: &SqlitePool,
    statement_id: Uuid,
    poll_id: Uuid,
    text: &str,
    approved: bool,
    created_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO statements (id, poll_id, text, approved, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(statement_id.to_string())
    .bind(poll_id.to_string())
    .bind(text)
    .bind(approved as i64)
    .bind(created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a statement approved, returning whether a row changed
pub async fn approve_statement(pool: &SqlitePool, statement_id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE statements SET approved = 1 WHERE id = ?")
        .bind(statement_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Resolve which poll a statement belongs to
pub async fn poll_for_statement(pool: &SqlitePool, statement_id: Uuid) -> Result<Option<Uuid>> {
    let poll: Option<String> = sqlx::query_scalar("SELECT poll_id FROM statements WHERE id = ?")
        .bind(statement_id.to_string())
        .fetch_optional(pool)
        .await?;
    match poll {
        Some(p) => Ok(Some(Uuid::parse_str(&p)?)),
        None => Ok(None),
    }
}
