//! Poll presentation configuration

use crate::models::{OrderingStrategy, PollConfig};
use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Load a poll's presentation config, falling back to defaults when no row
/// exists
pub async fn get_poll_config(pool: &SqlitePool, poll_id: Uuid) -> Result<PollConfig> {
    let row = sqlx::query(
        "SELECT ordering_strategy, batch_size, seed_override FROM poll_config WHERE poll_id = ?",
    )
    .bind(poll_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(PollConfig::default_for(poll_id));
    };

    let strategy: String = row.get("ordering_strategy");
    Ok(PollConfig {
        poll_id,
        ordering_strategy: OrderingStrategy::parse(&strategy).unwrap_or_else(|| {
            tracing::warn!(poll_id = %poll_id, strategy = %strategy, "Unknown ordering strategy, using weighted");
            OrderingStrategy::Weighted
        }),
        batch_size: row.get::<i64, _>("batch_size") as usize,
        seed_override: row.get("seed_override"),
    })
}

/// Write a poll's presentation config (test/admin surface)
pub async fn set_poll_config(pool: &SqlitePool, config: &PollConfig) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO poll_config (poll_id, ordering_strategy, batch_size, seed_override)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(poll_id) DO UPDATE SET
            ordering_strategy = excluded.ordering_strategy,
            batch_size = excluded.batch_size,
            seed_override = excluded.seed_override
        "#,
    )
    .bind(config.poll_id.to_string())
    .bind(config.ordering_strategy.as_str())
    .bind(config.batch_size as i64)
    .bind(config.seed_override)
    .execute(pool)
    .await?;
    Ok(())
}
