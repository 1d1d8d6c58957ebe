//! Statement weight cache
//!
//! Keyed by (poll, statement), no TTL: staleness is controlled entirely by
//! the two invalidation triggers (landscape recomputation, new-statement
//! approval). Two concurrent cache fills may both upsert; that race is
//! benign because the computation is a pure function of persisted data and
//! last-write-wins leaves an identical row.

use crate::models::{StatementWeight, WeightMode};
use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Upsert one computed weight
pub async fn upsert_weight(pool: &SqlitePool, poll_id: Uuid, weight: &StatementWeight) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO statement_weights (
            poll_id, statement_id, weight, predictiveness, consensus_potential,
            recency_boost, pass_rate_penalty, vote_count_boost, mode, computed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(poll_id, statement_id) DO UPDATE SET
            weight = excluded.weight,
            predictiveness = excluded.predictiveness,
            consensus_potential = excluded.consensus_potential,
            recency_boost = excluded.recency_boost,
            pass_rate_penalty = excluded.pass_rate_penalty,
            vote_count_boost = excluded.vote_count_boost,
            mode = excluded.mode,
            computed_at = excluded.computed_at
        "#,
    )
    .bind(poll_id.to_string())
    .bind(weight.statement_id.to_string())
    .bind(weight.weight)
    .bind(weight.predictiveness)
    .bind(weight.consensus_potential)
    .bind(weight.recency_boost)
    .bind(weight.pass_rate_penalty)
    .bind(weight.vote_count_boost)
    .bind(weight.mode.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch a cached weight, if present (presence does not imply freshness
/// beyond the last invalidation)
pub async fn get_cached_weight(
    pool: &SqlitePool,
    poll_id: Uuid,
    statement_id: Uuid,
) -> Result<Option<StatementWeight>> {
    let row = sqlx::query(
        "SELECT * FROM statement_weights WHERE poll_id = ? AND statement_id = ?",
    )
    .bind(poll_id.to_string())
    .bind(statement_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mode: String = row.get("mode");
    Ok(Some(StatementWeight {
        statement_id,
        weight: row.get("weight"),
        predictiveness: row.get("predictiveness"),
        consensus_potential: row.get("consensus_potential"),
        recency_boost: row.get("recency_boost"),
        pass_rate_penalty: row.get("pass_rate_penalty"),
        vote_count_boost: row.get("vote_count_boost"),
        mode: WeightMode::parse(&mode).ok_or_else(|| anyhow!("Unknown weight mode: {}", mode))?,
    }))
}

/// Drop every cached weight for a poll (both invalidation triggers call this)
pub async fn invalidate_poll_weights(pool: &SqlitePool, poll_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM statement_weights WHERE poll_id = ?")
        .bind(poll_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
