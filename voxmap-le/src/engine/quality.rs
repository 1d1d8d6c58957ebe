//! Eligibility and quality gate
//!
//! Two hard floors (statement count, distinct voter count) checked with
//! count queries only, cheap enough to run synchronously before any
//! expensive work is enqueued. Two soft signals (variance explained,
//! silhouette) set a non-fatal quality tier after PCA/k-means run; a result
//! below both soft thresholds is still persisted and surfaced, tagged low,
//! because showing something beats blocking an engaged poll.

use crate::db;
use crate::error::{EngineError, EngineResult};
use crate::models::QualityTier;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;
use voxmap_common::params::PARAMS;

/// Eligibility check outcome, user-displayable
#[derive(Debug, Clone, Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    /// Populated only when ineligible ("Insufficient users: 19/20")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub voter_count: usize,
    pub statement_count: usize,
}

/// Check the hard eligibility floors for a poll
pub async fn check_eligibility(pool: &SqlitePool, poll_id: Uuid) -> EngineResult<Eligibility> {
    let min_statements = *PARAMS.min_statements.read().unwrap();
    let min_voters = *PARAMS.min_voters.read().unwrap();

    let statement_count = db::statements::count_approved_statements(pool, poll_id).await?;
    let voter_count = db::votes::count_distinct_voters(pool, poll_id).await?;

    // Statement floor is named first when both are missed; either reason
    // names which floor was missed and by how much
    let reason = if statement_count < min_statements {
        Some(format!(
            "Insufficient statements: {}/{}",
            statement_count, min_statements
        ))
    } else if voter_count < min_voters {
        Some(format!("Insufficient users: {}/{}", voter_count, min_voters))
    } else {
        None
    };

    Ok(Eligibility {
        eligible: reason.is_none(),
        reason,
        voter_count,
        statement_count,
    })
}

/// Like `check_eligibility` but converts an ineligible poll into the
/// structured InsufficientData error the pipeline propagates
pub async fn require_eligible(pool: &SqlitePool, poll_id: Uuid) -> EngineResult<Eligibility> {
    let eligibility = check_eligibility(pool, poll_id).await?;
    if let Some(reason) = &eligibility.reason {
        return Err(EngineError::InsufficientData {
            reason: reason.clone(),
            voter_count: eligibility.voter_count,
            statement_count: eligibility.statement_count,
        });
    }
    Ok(eligibility)
}

/// Combine the two soft signals into a tier: the lower of the variance tier
/// (high >= 0.6, medium >= 0.4) and the silhouette tier (high >= 0.4,
/// medium >= 0.25)
pub fn evaluate_quality(total_variance_explained: f64, silhouette: f64) -> QualityTier {
    let variance_tier = if total_variance_explained >= 0.6 {
        QualityTier::High
    } else if total_variance_explained >= 0.4 {
        QualityTier::Medium
    } else {
        QualityTier::Low
    };

    let silhouette_tier = if silhouette >= 0.4 {
        QualityTier::High
    } else if silhouette >= 0.25 {
        QualityTier::Medium
    } else {
        QualityTier::Low
    };

    lower_tier(variance_tier, silhouette_tier)
}

fn lower_tier(a: QualityTier, b: QualityTier) -> QualityTier {
    use QualityTier::*;
    match (a, b) {
        (Low, _) | (_, Low) => Low,
        (Medium, _) | (_, Medium) => Medium,
        (High, High) => High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tc_u_quality_tier_thresholds() {
        assert_eq!(evaluate_quality(0.6, 0.4), QualityTier::High);
        assert_eq!(evaluate_quality(0.5, 0.5), QualityTier::Medium);
        assert_eq!(evaluate_quality(0.7, 0.3), QualityTier::Medium);
        assert_eq!(evaluate_quality(0.39, 0.5), QualityTier::Low);
        assert_eq!(evaluate_quality(0.9, 0.1), QualityTier::Low);
        assert_eq!(evaluate_quality(0.1, 0.1), QualityTier::Low);
    }

    #[test]
    fn tc_u_quality_low_never_blocks() {
        // The tier is descriptive: even rock-bottom signals produce a tier,
        // not an error
        let tier = evaluate_quality(0.0, -1.0);
        assert_eq!(tier, QualityTier::Low);
    }
}
