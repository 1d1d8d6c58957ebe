//! Statement weighting service
//!
//! Derives a per-statement scalar priority weight used by the ordering
//! service. Two modes, chosen by whether the poll currently has a persisted,
//! eligible landscape:
//!
//! - Clustering mode: predictiveness (between-group agreement variance —
//!   a statement that discriminates between opinion groups is worth asking),
//!   consensus potential (from the classification type), recency boost,
//!   pass-rate penalty.
//! - Cold-start mode: vote-count boost (favors under-voted statements to
//!   spread exposure evenly), recency boost, pass-rate penalty.
//!
//! Weights are cached with no TTL; the only invalidation events are
//! landscape recomputation and approval of a new statement. A missing cache
//! entry is computed synchronously and written back before returning.

use crate::db;
use crate::models::{
    ClassificationType, LandscapeResult, StatementWeight, WeightMode,
};
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;
use voxmap_common::events::{EventBus, VoxmapEvent};
use voxmap_common::params::PARAMS;

/// Weights never collapse to zero so the weighted ordering can always draw
/// every statement
const WEIGHT_FLOOR: f64 = 0.05;

/// Get weights for the requested statements, filling the cache on miss
pub async fn get_statement_weights(
    pool: &SqlitePool,
    poll_id: Uuid,
    statement_ids: &[Uuid],
) -> Result<Vec<StatementWeight>> {
    // Mode is decided once per call: clustering only with an eligible,
    // persisted landscape
    let eligible = crate::engine::quality::check_eligibility(pool, poll_id)
        .await
        .map(|e| e.eligible)
        .unwrap_or(false);
    let landscape = if eligible {
        db::landscape::get_landscape(pool, poll_id).await?
    } else {
        None
    };

    // One statement-list fetch serves every recency computation below
    let statements = db::statements::list_approved_statements(pool, poll_id).await?;
    let created_at: HashMap<Uuid, chrono::DateTime<Utc>> =
        statements.iter().map(|s| (s.id, s.created_at)).collect();

    let mut weights = Vec::with_capacity(statement_ids.len());
    for &statement_id in statement_ids {
        if let Some(cached) = db::weights::get_cached_weight(pool, poll_id, statement_id).await? {
            weights.push(cached);
            continue;
        }

        // Cache miss is a fill path, not an error
        let weight = compute_weight(
            pool,
            statement_id,
            created_at.get(&statement_id).copied(),
            landscape.as_ref(),
        )
        .await?;
        db::weights::upsert_weight(pool, poll_id, &weight).await?;
        weights.push(weight);
    }

    Ok(weights)
}

/// Invalidate every cached weight for a poll
pub async fn invalidate_weights(pool: &SqlitePool, event_bus: &EventBus, poll_id: Uuid) -> Result<u64> {
    let dropped = db::weights::invalidate_poll_weights(pool, poll_id).await?;
    tracing::info!(poll_id = %poll_id, dropped, "Statement weight cache invalidated");
    event_bus.emit_lossy(VoxmapEvent::WeightsInvalidated {
        poll_id,
        timestamp: Utc::now(),
    });
    Ok(dropped)
}

/// Compute one statement's weight in the mode the poll currently supports
async fn compute_weight(
    pool: &SqlitePool,
    statement_id: Uuid,
    created_at: Option<chrono::DateTime<Utc>>,
    landscape: Option<&LandscapeResult>,
) -> Result<StatementWeight> {
    let stats = db::votes::statement_vote_stats(pool, statement_id).await?;
    let recency = created_at.map(recency_boost).unwrap_or(0.0);
    let pass_penalty = stats.pass_rate();

    match landscape {
        Some(landscape) => {
            let classification = landscape
                .classifications
                .iter()
                .find(|c| c.statement_id == statement_id);

            // Predictiveness: normalized spread of per-group agreement.
            // Agreement lives in [0,1]; a std-dev of 0.5 is the maximum
            // (half the groups at 0, half at 1).
            let predictiveness = classification
                .map(|c| (c.std_dev_agreement / 0.5).clamp(0.0, 1.0))
                .unwrap_or(0.0);

            let consensus_potential = classification
                .map(|c| consensus_potential(c.classification))
                .unwrap_or(0.5);

            let combined = 0.4 * predictiveness + 0.3 * consensus_potential + 0.3 * recency;
            let weight = (combined * (1.0 - 0.5 * pass_penalty)).max(WEIGHT_FLOOR);

            Ok(StatementWeight {
                statement_id,
                weight,
                predictiveness,
                consensus_potential,
                recency_boost: recency,
                pass_rate_penalty: pass_penalty,
                vote_count_boost: None,
                mode: WeightMode::Clustering,
            })
        }
        None => {
            // Cold start: spread exposure toward under-voted statements
            let vote_boost = 1.0 / (1.0 + stats.total as f64);
            let combined = 0.5 * vote_boost + 0.3 * recency + 0.2;
            let weight = (combined * (1.0 - 0.5 * pass_penalty)).max(WEIGHT_FLOOR);

            Ok(StatementWeight {
                statement_id,
                weight,
                predictiveness: 0.0,
                consensus_potential: 0.0,
                recency_boost: recency,
                pass_rate_penalty: pass_penalty,
                vote_count_boost: Some(vote_boost),
                mode: WeightMode::ColdStart,
            })
        }
    }
}

/// Consensus potential by classification type: consensus statements keep
/// building common ground; divisive ones mostly restate known splits
fn consensus_potential(classification: ClassificationType) -> f64 {
    match classification {
        ClassificationType::PositiveConsensus | ClassificationType::NegativeConsensus => 1.0,
        ClassificationType::Bridge => 0.7,
        ClassificationType::Normal => 0.5,
        ClassificationType::Divisive => 0.3,
    }
}

/// Linear decay from 1.0 (brand new) to 0.0 at the recency window edge.
/// Whole-poll invalidation on new-statement approval recomputes every
/// statement's boost against the shifted age distribution.
fn recency_boost(created_at: chrono::DateTime<Utc>) -> f64 {
    let window_days = *PARAMS.recency_window_days.read().unwrap();
    let age_days = (Utc::now() - created_at).num_seconds() as f64 / 86_400.0;
    (1.0 - age_days / window_days).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consensus_types_outrank_divisive() {
        assert!(
            consensus_potential(ClassificationType::PositiveConsensus)
                > consensus_potential(ClassificationType::Divisive)
        );
        assert!(
            consensus_potential(ClassificationType::Bridge)
                > consensus_potential(ClassificationType::Divisive)
        );
        assert_eq!(
            consensus_potential(ClassificationType::PositiveConsensus),
            consensus_potential(ClassificationType::NegativeConsensus)
        );
    }

    #[test]
    fn recency_decays_to_zero_past_the_window() {
        let fresh = recency_boost(Utc::now());
        assert!(fresh > 0.99, "fresh statement boost {}", fresh);

        let stale = recency_boost(Utc::now() - chrono::Duration::days(30));
        assert_eq!(stale, 0.0);
    }
}
