//! Landscape orchestrator
//!
//! Runs the full pipeline end-to-end and persists the result atomically.
//! On failure at any stage before commit, no partial state is written and
//! the caller receives the specific failure. After a successful commit the
//! poll's weight cache is invalidated; that step is non-fatal because the
//! landscape itself already succeeded and stale weights self-correct on the
//! next read.

use crate::db;
use crate::engine::{classifier, grouping, kmeans, matrix::OpinionMatrix, pca, quality};
use crate::error::EngineResult;
use crate::models::{LandscapeMetadata, LandscapeResult, VoterPosition};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;
use voxmap_common::events::{EventBus, VoxmapEvent};
use voxmap_common::params::PARAMS;
use voxmap_common::seed::seed_from_str;

/// Compute and persist a poll's opinion landscape
///
/// Stages: eligibility → matrix → PCA → k-means → coarse grouping →
/// classification → transactional replace → cache invalidation.
pub async fn compute_opinion_landscape(
    pool: &SqlitePool,
    event_bus: &EventBus,
    poll_id: Uuid,
) -> EngineResult<LandscapeResult> {
    let start = std::time::Instant::now();

    // Hard floors first; cheap count queries only
    let eligibility = quality::require_eligible(pool, poll_id).await?;
    tracing::info!(
        poll_id = %poll_id,
        voters = eligibility.voter_count,
        statements = eligibility.statement_count,
        "Starting landscape computation"
    );

    // Phase 1: opinion matrix
    let statements = db::statements::list_approved_statements(pool, poll_id).await?;
    let statement_ids: Vec<Uuid> = statements.iter().map(|s| s.id).collect();
    let votes = db::votes::list_votes(pool, &statement_ids).await?;
    let matrix = OpinionMatrix::build(&statements, &votes);
    tracing::debug!(
        poll_id = %poll_id,
        rows = matrix.voter_count(),
        cols = matrix.statement_count(),
        "Opinion matrix built"
    );

    // Phase 2: PCA to 2-D
    let pca_result = pca::compute_pca(&matrix, 2).map_err(|e| {
        tracing::error!(
            poll_id = %poll_id,
            rows = matrix.voter_count(),
            cols = matrix.statement_count(),
            error = %e,
            "PCA failed"
        );
        e
    })?;
    let total_variance = pca_result.total_variance_first_two();

    // Phase 3: fine k-means, seeded off the poll id for idempotence
    let k_menu = PARAMS.fine_k_menu.read().unwrap().clone();
    let k = kmeans::select_k(matrix.voter_count(), &k_menu);
    let seed = seed_from_str(&poll_id.to_string());
    let fine = kmeans::run_kmeans(&pca_result.coordinates, k, seed).map_err(|e| {
        tracing::error!(
            poll_id = %poll_id,
            k,
            rows = matrix.voter_count(),
            error = %e,
            "k-means failed"
        );
        e
    })?;

    // Phase 4: coarse grouping
    let coarse_target = *PARAMS.coarse_group_target.read().unwrap();
    let coarse = grouping::coarse_group(&fine, coarse_target);
    tracing::debug!(
        poll_id = %poll_id,
        fine_k = fine.k,
        coarse_groups = coarse.groups.len(),
        silhouette = fine.silhouette,
        "Clustering complete"
    );

    // Phase 5: statement classification
    let classifier_params = classifier::ClassifierParams {
        strong_threshold: *PARAMS.strong_agreement_threshold.read().unwrap(),
        opposition_threshold: *PARAMS.opposition_threshold.read().unwrap(),
        ..Default::default()
    };
    let classifications = classifier::classify_statements(
        &matrix,
        &coarse.assignments,
        coarse.groups.len(),
        &classifier_params,
    );

    // Assemble the result
    let quality_tier = quality::evaluate_quality(total_variance, fine.silhouette);
    let positions: Vec<VoterPosition> = matrix
        .voters
        .iter()
        .enumerate()
        .map(|(i, &voter_id)| VoterPosition {
            voter_id,
            x: pca_result.coordinates[i][0],
            y: pca_result.coordinates[i].get(1).copied().unwrap_or(0.0),
            fine_cluster: fine.assignments[i],
            coarse_group: coarse.assignments[i],
            agree_count: matrix.tallies[i].agree,
            disagree_count: matrix.tallies[i].disagree,
            pass_count: matrix.tallies[i].pass,
            total_count: matrix.tallies[i].total(),
        })
        .collect();

    let result = LandscapeResult {
        metadata: LandscapeMetadata {
            poll_id,
            pca_components: pca_result.components,
            pca_mean: pca_result.mean,
            variance_explained: pca_result.variance_explained,
            centroids: fine.centroids,
            fine_k: fine.k,
            coarse_groups: coarse.groups,
            silhouette: fine.silhouette,
            total_variance_explained: total_variance,
            quality_tier,
            voter_count: matrix.voter_count(),
            statement_count: matrix.statement_count(),
            computed_at: Utc::now(),
        },
        positions,
        classifications,
    };

    // Phase 6: atomic persistence (delete-then-insert, one transaction)
    db::landscape::replace_landscape(pool, &result).await?;

    // Post-commit: weight cache invalidation, non-fatal
    if let Err(e) = db::weights::invalidate_poll_weights(pool, poll_id).await {
        tracing::warn!(
            poll_id = %poll_id,
            error = %e,
            "Weight cache invalidation failed after landscape commit; stale weights will self-correct"
        );
    } else {
        event_bus.emit_lossy(VoxmapEvent::WeightsInvalidated {
            poll_id,
            timestamp: Utc::now(),
        });
    }

    event_bus.emit_lossy(VoxmapEvent::LandscapeComputed {
        poll_id,
        voter_count: result.metadata.voter_count,
        statement_count: result.metadata.statement_count,
        quality_tier: result.metadata.quality_tier.as_str().to_string(),
        timestamp: Utc::now(),
    });

    tracing::info!(
        poll_id = %poll_id,
        quality_tier = result.metadata.quality_tier.as_str(),
        variance_explained = total_variance,
        silhouette = result.metadata.silhouette,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Landscape computation committed"
    );

    Ok(result)
}
