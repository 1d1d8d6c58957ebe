//! Statement classifier / consensus detector
//!
//! For each statement, compares per-coarse-group agreement rates to label it
//! consensus, divisive, bridge, or normal. Classification runs over the whole
//! statement set at once because bridge detection cross-references group-pair
//! agreement patterns across every statement, not just the one being labeled.
//!
//! Classification rule, applied in priority order (ties break toward the
//! earlier category):
//! 1. Consensus (positive or negative): all groups strong on the same side
//! 2. Partial consensus: all but one (two, for five or more groups) strong on
//!    the same side — same top-level type, weaker internally
//! 3. Split: strong-agree vs strong-disagree group counts differ by at most
//!    one — divisive along group lines
//! 4. Bridge: both members of an otherwise-opposed group pair agree strongly
//! 5. Normal: no extractable group-structure pattern

use crate::engine::matrix::OpinionMatrix;
use crate::models::{ClassificationType, ConsensusStrength, StatementClassification};

/// Classifier thresholds (signed percentage points)
#[derive(Debug, Clone)]
pub struct ClassifierParams {
    /// Strong-agreement magnitude, default 60.0
    pub strong_threshold: f64,
    /// Group-pair opposition threshold, default 80.0
    pub opposition_threshold: f64,
    /// Minimum jointly-voted statements before a pair can count as opposed
    pub min_joint_statements: usize,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            strong_threshold: 60.0,
            opposition_threshold: 80.0,
            min_joint_statements: 3,
        }
    }
}

/// Classify every statement in the matrix
///
/// `coarse_assignments` maps matrix row index to coarse group id;
/// `group_count` is the number of coarse groups.
pub fn classify_statements(
    matrix: &OpinionMatrix,
    coarse_assignments: &[usize],
    group_count: usize,
    params: &ClassifierParams,
) -> Vec<StatementClassification> {
    // Per-statement, per-group normalized agreement
    let agreement = group_agreement_table(matrix, coarse_assignments, group_count);

    // Cross-statement opposition structure between group pairs
    let opposed_pairs = opposed_group_pairs(&agreement, group_count, params);

    matrix
        .statements
        .iter()
        .enumerate()
        .map(|(s, &statement_id)| {
            let per_group = &agreement[s];
            let (classification, strength, bridge_score, bridged_groups) =
                classify_one(per_group, group_count, &opposed_pairs, params);

            let voted: Vec<f64> = per_group.iter().filter_map(|a| *a).collect();
            let mean = mean(&voted);
            let std_dev = std_dev(&voted, mean);

            StatementClassification {
                statement_id,
                classification,
                consensus_strength: strength,
                group_agreement: per_group.clone(),
                mean_agreement: mean,
                std_dev_agreement: std_dev,
                bridge_score,
                bridged_groups,
            }
        })
        .collect()
}

/// agreement[statement][group] = mean of (vote+1)/2 over the group's voters
/// who voted on the statement; None when no group member voted
fn group_agreement_table(
    matrix: &OpinionMatrix,
    coarse_assignments: &[usize],
    group_count: usize,
) -> Vec<Vec<Option<f64>>> {
    let m = matrix.statement_count();
    let mut sums = vec![vec![0.0f64; group_count]; m];
    let mut counts = vec![vec![0usize; group_count]; m];

    for (row, assignment) in matrix.rows.iter().zip(coarse_assignments.iter()) {
        for (s, cell) in row.iter().enumerate() {
            if let Some(v) = cell {
                sums[s][*assignment] += (v + 1.0) / 2.0;
                counts[s][*assignment] += 1;
            }
        }
    }

    (0..m)
        .map(|s| {
            (0..group_count)
                .map(|g| {
                    if counts[s][g] > 0 {
                        Some(sums[s][g] / counts[s][g] as f64)
                    } else {
                        None
                    }
                })
                .collect()
        })
        .collect()
}

/// Group pairs whose mean absolute signed-agreement gap across the statement
/// set exceeds the opposition threshold
fn opposed_group_pairs(
    agreement: &[Vec<Option<f64>>],
    group_count: usize,
    params: &ClassifierParams,
) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for g1 in 0..group_count {
        for g2 in (g1 + 1)..group_count {
            let mut gap_sum = 0.0f64;
            let mut joint = 0usize;
            for per_group in agreement {
                if let (Some(a1), Some(a2)) = (per_group[g1], per_group[g2]) {
                    gap_sum += (signed(a1) - signed(a2)).abs();
                    joint += 1;
                }
            }
            if joint >= params.min_joint_statements
                && gap_sum / joint as f64 > params.opposition_threshold
            {
                pairs.push((g1, g2));
            }
        }
    }
    pairs
}

/// Apply the priority cascade to one statement
fn classify_one(
    per_group: &[Option<f64>],
    group_count: usize,
    opposed_pairs: &[(usize, usize)],
    params: &ClassifierParams,
) -> (
    ClassificationType,
    Option<ConsensusStrength>,
    Option<f64>,
    Option<Vec<usize>>,
) {
    let signed_scores: Vec<Option<f64>> =
        per_group.iter().map(|a| a.map(signed)).collect();

    let voted = signed_scores.iter().flatten().count();
    let strong_pos = signed_scores
        .iter()
        .flatten()
        .filter(|&&s| s > params.strong_threshold)
        .count();
    let strong_neg = signed_scores
        .iter()
        .flatten()
        .filter(|&&s| s < -params.strong_threshold)
        .count();

    // Statements with votes from fewer than two groups have no extractable
    // group structure
    if voted < 2 {
        return (ClassificationType::Normal, None, None, None);
    }

    // 1. Full consensus: every group voted and every group is strong on the
    //    same side
    if voted == group_count && strong_pos == group_count {
        return (
            ClassificationType::PositiveConsensus,
            Some(ConsensusStrength::Full),
            None,
            None,
        );
    }
    if voted == group_count && strong_neg == group_count {
        return (
            ClassificationType::NegativeConsensus,
            Some(ConsensusStrength::Full),
            None,
            None,
        );
    }

    // 2. Partial consensus: all but one group (two, for >=5 groups) strong
    //    on the same side. The exceptional groups may disagree, even
    //    strongly; an earlier rule outranks a later one on ties, so this
    //    fires before the split check sees the same pattern.
    let allowed_exceptions = if group_count >= 5 { 2 } else { 1 };
    if strong_pos >= group_count.saturating_sub(allowed_exceptions) && strong_pos >= 2 {
        return (
            ClassificationType::PositiveConsensus,
            Some(ConsensusStrength::Partial),
            None,
            None,
        );
    }
    if strong_neg >= group_count.saturating_sub(allowed_exceptions) && strong_neg >= 2 {
        return (
            ClassificationType::NegativeConsensus,
            Some(ConsensusStrength::Partial),
            None,
            None,
        );
    }

    // 3. Split along group lines
    if strong_pos >= 1 && strong_neg >= 1 && strong_pos.abs_diff(strong_neg) <= 1 {
        return (ClassificationType::Divisive, None, None, None);
    }

    // 4. Bridge: an otherwise-opposed pair agrees strongly on this statement
    let mut bridged: Vec<usize> = Vec::new();
    for &(g1, g2) in opposed_pairs {
        if let (Some(s1), Some(s2)) = (signed_scores[g1], signed_scores[g2]) {
            if s1 > params.strong_threshold && s2 > params.strong_threshold {
                if !bridged.contains(&g1) {
                    bridged.push(g1);
                }
                if !bridged.contains(&g2) {
                    bridged.push(g2);
                }
            }
        }
    }
    if !bridged.is_empty() {
        bridged.sort_unstable();
        // Bridge score: minimum pairwise normalized agreement among the
        // connected groups
        let score = bridged
            .iter()
            .filter_map(|&g| per_group[g])
            .fold(f64::INFINITY, f64::min);
        let score = if score.is_finite() { score } else { 0.0 };
        return (
            ClassificationType::Bridge,
            None,
            Some(score),
            Some(bridged),
        );
    }

    // 5. Default
    (ClassificationType::Normal, None, None, None)
}

fn signed(agreement: f64) -> f64 {
    StatementClassification::signed_agreement(agreement)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
