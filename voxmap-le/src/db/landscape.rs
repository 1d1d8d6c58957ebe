//! Landscape persistence
//!
//! The three landscape tables (metadata, voter positions, statement
//! classifications) are replaced delete-then-insert inside one transaction
//! so a reader never observes positions from a new computation joined
//! against stale classifications from the old one.

use crate::error::{EngineError, EngineResult};
use crate::models::{
    ClassificationType, CoarseGroup, LandscapeMetadata, LandscapeResult, QualityTier,
    StatementClassification, VoterPosition,
};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Atomically replace a poll's landscape with a freshly computed one
///
/// Commit failures surface as `Persistence`; nothing is visible until the
/// transaction commits.
pub async fn replace_landscape(pool: &SqlitePool, result: &LandscapeResult) -> EngineResult<()> {
    let poll_id = result.metadata.poll_id.to_string();

    let mut tx = pool.begin().await.map_err(EngineError::Persistence)?;

    // Delete prior computation
    sqlx::query("DELETE FROM landscape_metadata WHERE poll_id = ?")
        .bind(&poll_id)
        .execute(&mut *tx)
        .await
        .map_err(EngineError::Persistence)?;
    sqlx::query("DELETE FROM voter_positions WHERE poll_id = ?")
        .bind(&poll_id)
        .execute(&mut *tx)
        .await
        .map_err(EngineError::Persistence)?;
    sqlx::query("DELETE FROM statement_classifications WHERE poll_id = ?")
        .bind(&poll_id)
        .execute(&mut *tx)
        .await
        .map_err(EngineError::Persistence)?;

    // Insert the new set
    let meta = &result.metadata;
    sqlx::query(
        r#"
        INSERT INTO landscape_metadata (
            poll_id, pca_components, pca_mean, variance_explained, centroids,
            fine_k, coarse_groups, silhouette, total_variance_explained,
            quality_tier, voter_count, statement_count, computed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&poll_id)
    .bind(to_json(&meta.pca_components)?)
    .bind(to_json(&meta.pca_mean)?)
    .bind(to_json(&meta.variance_explained)?)
    .bind(to_json(&meta.centroids)?)
    .bind(meta.fine_k as i64)
    .bind(to_json(&meta.coarse_groups)?)
    .bind(meta.silhouette)
    .bind(meta.total_variance_explained)
    .bind(meta.quality_tier.as_str())
    .bind(meta.voter_count as i64)
    .bind(meta.statement_count as i64)
    .bind(meta.computed_at.to_rfc3339())
    .execute(&mut *tx)
    .await
    .map_err(EngineError::Persistence)?;

    for position in &result.positions {
        sqlx::query(
            r#"
            INSERT INTO voter_positions (
                poll_id, voter_id, x, y, fine_cluster, coarse_group,
                agree_count, disagree_count, pass_count, total_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&poll_id)
        .bind(position.voter_id.to_string())
        .bind(position.x)
        .bind(position.y)
        .bind(position.fine_cluster as i64)
        .bind(position.coarse_group as i64)
        .bind(position.agree_count as i64)
        .bind(position.disagree_count as i64)
        .bind(position.pass_count as i64)
        .bind(position.total_count as i64)
        .execute(&mut *tx)
        .await
        .map_err(EngineError::Persistence)?;
    }

    for classification in &result.classifications {
        sqlx::query(
            r#"
            INSERT INTO statement_classifications (
                poll_id, statement_id, classification, group_agreement,
                mean_agreement, std_dev_agreement, bridge_score, bridged_groups
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&poll_id)
        .bind(classification.statement_id.to_string())
        .bind(classification.classification.as_str())
        .bind(to_json(&classification.group_agreement)?)
        .bind(classification.mean_agreement)
        .bind(classification.std_dev_agreement)
        .bind(classification.bridge_score)
        .bind(match &classification.bridged_groups {
            Some(groups) => Some(to_json(groups)?),
            None => None,
        })
        .execute(&mut *tx)
        .await
        .map_err(EngineError::Persistence)?;
    }

    tx.commit().await.map_err(EngineError::Persistence)?;
    Ok(())
}

/// Load a poll's persisted landscape, if one exists
pub async fn get_landscape(pool: &SqlitePool, poll_id: Uuid) -> Result<Option<LandscapeResult>> {
    let meta_row = sqlx::query("SELECT * FROM landscape_metadata WHERE poll_id = ?")
        .bind(poll_id.to_string())
        .fetch_optional(pool)
        .await?;

    let Some(meta_row) = meta_row else {
        return Ok(None);
    };

    let quality_tier: String = meta_row.get("quality_tier");
    let computed_at: String = meta_row.get("computed_at");
    let coarse_groups: Vec<CoarseGroup> = from_json(meta_row.get("coarse_groups"))?;

    let metadata = LandscapeMetadata {
        poll_id,
        pca_components: from_json(meta_row.get("pca_components"))?,
        pca_mean: from_json(meta_row.get("pca_mean"))?,
        variance_explained: from_json(meta_row.get("variance_explained"))?,
        centroids: from_json(meta_row.get("centroids"))?,
        fine_k: meta_row.get::<i64, _>("fine_k") as usize,
        coarse_groups,
        silhouette: meta_row.get("silhouette"),
        total_variance_explained: meta_row.get("total_variance_explained"),
        quality_tier: QualityTier::parse(&quality_tier)
            .ok_or_else(|| anyhow!("Unknown quality tier: {}", quality_tier))?,
        voter_count: meta_row.get::<i64, _>("voter_count") as usize,
        statement_count: meta_row.get::<i64, _>("statement_count") as usize,
        computed_at: computed_at.parse::<DateTime<Utc>>()?,
    };

    let position_rows = sqlx::query("SELECT * FROM voter_positions WHERE poll_id = ?")
        .bind(poll_id.to_string())
        .fetch_all(pool)
        .await?;
    let mut positions = Vec::with_capacity(position_rows.len());
    for row in position_rows {
        let voter_id: String = row.get("voter_id");
        positions.push(VoterPosition {
            voter_id: Uuid::parse_str(&voter_id)?,
            x: row.get("x"),
            y: row.get("y"),
            fine_cluster: row.get::<i64, _>("fine_cluster") as usize,
            coarse_group: row.get::<i64, _>("coarse_group") as usize,
            agree_count: row.get::<i64, _>("agree_count") as usize,
            disagree_count: row.get::<i64, _>("disagree_count") as usize,
            pass_count: row.get::<i64, _>("pass_count") as usize,
            total_count: row.get::<i64, _>("total_count") as usize,
        });
    }

    let class_rows = sqlx::query("SELECT * FROM statement_classifications WHERE poll_id = ?")
        .bind(poll_id.to_string())
        .fetch_all(pool)
        .await?;
    let mut classifications = Vec::with_capacity(class_rows.len());
    for row in class_rows {
        let statement_id: String = row.get("statement_id");
        let classification: String = row.get("classification");
        let bridged_groups: Option<String> = row.get("bridged_groups");
        classifications.push(StatementClassification {
            statement_id: Uuid::parse_str(&statement_id)?,
            classification: ClassificationType::parse(&classification)
                .ok_or_else(|| anyhow!("Unknown classification: {}", classification))?,
            consensus_strength: None,
            group_agreement: from_json(row.get("group_agreement"))?,
            mean_agreement: row.get("mean_agreement"),
            std_dev_agreement: row.get("std_dev_agreement"),
            bridge_score: row.get("bridge_score"),
            bridged_groups: match bridged_groups {
                Some(json) => Some(serde_json::from_str(&json)?),
                None => None,
            },
        });
    }

    Ok(Some(LandscapeResult {
        metadata,
        positions,
        classifications,
    }))
}

/// Count rows across the three landscape tables (test and diagnostic surface)
pub async fn landscape_row_counts(pool: &SqlitePool, poll_id: Uuid) -> Result<(i64, i64, i64)> {
    let id = poll_id.to_string();
    let meta: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM landscape_metadata WHERE poll_id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;
    let positions: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM voter_positions WHERE poll_id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await?;
    let classifications: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM statement_classifications WHERE poll_id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await?;
    Ok((meta, positions, classifications))
}

fn to_json<T: serde::Serialize>(value: &T) -> EngineResult<String> {
    serde_json::to_string(value)
        .map_err(|e| EngineError::Numerical(format!("Serialization failed: {}", e)))
}

fn from_json<T: serde::de::DeserializeOwned>(json: String) -> Result<T> {
    serde_json::from_str(&json).context("Malformed JSON column")
}
