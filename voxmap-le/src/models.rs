//! Domain models for the opinion landscape
//!
//! These are the persisted shapes: one `LandscapeMetadata` per poll, one
//! `VoterPosition` per voter per poll, one `StatementClassification` per
//! statement per poll. All three are replaced wholesale on every
//! recomputation and are read-only in between.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Statement classification type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationType {
    /// All groups agree strongly (positive side)
    PositiveConsensus,
    /// All groups disagree strongly
    NegativeConsensus,
    /// Groups split strongly along group lines
    Divisive,
    /// Otherwise-opposed groups agree on this statement
    Bridge,
    /// No extractable group-structure pattern
    Normal,
}

impl ClassificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationType::PositiveConsensus => "positive_consensus",
            ClassificationType::NegativeConsensus => "negative_consensus",
            ClassificationType::Divisive => "divisive",
            ClassificationType::Bridge => "bridge",
            ClassificationType::Normal => "normal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive_consensus" => Some(ClassificationType::PositiveConsensus),
            "negative_consensus" => Some(ClassificationType::NegativeConsensus),
            "divisive" => Some(ClassificationType::Divisive),
            "bridge" => Some(ClassificationType::Bridge),
            "normal" => Some(ClassificationType::Normal),
            _ => None,
        }
    }
}

/// Distinguishes full from partial consensus internally; both map to the
/// same top-level classification type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStrength {
    Full,
    Partial,
}

/// Per-statement classification output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementClassification {
    pub statement_id: Uuid,
    pub classification: ClassificationType,
    /// Full vs partial consensus, when the type is a consensus type
    pub consensus_strength: Option<ConsensusStrength>,
    /// Normalized agreement per coarse group, indexed by group id;
    /// 0 = full disagreement, 1 = full agreement. None when the group cast
    /// no votes on this statement.
    pub group_agreement: Vec<Option<f64>>,
    /// Mean agreement across groups that voted
    pub mean_agreement: f64,
    /// Standard deviation of agreement across groups that voted
    pub std_dev_agreement: f64,
    /// Bridge statements only: minimum pairwise agreement among connected groups
    pub bridge_score: Option<f64>,
    /// Bridge statements only: coarse group ids this statement connects
    pub bridged_groups: Option<Vec<usize>>,
}

impl StatementClassification {
    /// Signed display scale: -100 = unanimous disagreement, +100 = unanimous
    /// agreement
    pub fn signed_agreement(score: f64) -> f64 {
        (score - 0.5) * 200.0
    }
}

/// A human-facing aggregation of fine clusters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoarseGroup {
    pub id: usize,
    /// Display label ("Group A", "Group B", ...)
    pub label: String,
    /// Centroid in reduced (PCA) space
    pub centroid: Vec<f64>,
    /// Fine-cluster ids subsumed by this group, for drill-down
    pub fine_cluster_ids: Vec<usize>,
    /// Total voters across member fine clusters
    pub voter_count: usize,
}

/// One voter's place in the landscape plus cached vote tallies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterPosition {
    pub voter_id: Uuid,
    /// First principal component coordinate
    pub x: f64,
    /// Second principal component coordinate
    pub y: f64,
    pub fine_cluster: usize,
    pub coarse_group: usize,
    pub agree_count: usize,
    pub disagree_count: usize,
    pub pass_count: usize,
    pub total_count: usize,
}

/// Result quality tier, set from the two soft signals. Never blocks
/// persistence: a low-quality landscape is still shown, tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    High,
    Medium,
    Low,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::High => "high",
            QualityTier::Medium => "medium",
            QualityTier::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(QualityTier::High),
            "medium" => Some(QualityTier::Medium),
            "low" => Some(QualityTier::Low),
            _ => None,
        }
    }
}

/// Poll-level landscape metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandscapeMetadata {
    pub poll_id: Uuid,
    /// PCA component vectors (component-major)
    pub pca_components: Vec<Vec<f64>>,
    /// Mean vector used for centering/imputation
    pub pca_mean: Vec<f64>,
    /// Per-component variance-explained fractions
    pub variance_explained: Vec<f64>,
    /// Fine k-means centroid matrix
    pub centroids: Vec<Vec<f64>>,
    /// K actually used for fine clustering
    pub fine_k: usize,
    pub coarse_groups: Vec<CoarseGroup>,
    /// Silhouette score over the fine assignment, in [-1, 1]
    pub silhouette: f64,
    /// Variance explained by the first two components, in [0, 1]
    pub total_variance_explained: f64,
    pub quality_tier: QualityTier,
    pub voter_count: usize,
    pub statement_count: usize,
    pub computed_at: chrono::DateTime<chrono::Utc>,
}

/// The complete persisted output of one clustering pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandscapeResult {
    pub metadata: LandscapeMetadata,
    pub positions: Vec<VoterPosition>,
    pub classifications: Vec<StatementClassification>,
}

/// Weighting mode in effect when a weight was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    /// Landscape available: predictiveness/consensus driven
    Clustering,
    /// Below the voter floor or no landscape yet: exposure-spreading
    ColdStart,
}

impl WeightMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightMode::Clustering => "clustering",
            WeightMode::ColdStart => "cold_start",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clustering" => Some(WeightMode::Clustering),
            "cold_start" => Some(WeightMode::ColdStart),
            _ => None,
        }
    }
}

/// Per-statement priority weight with its components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementWeight {
    pub statement_id: Uuid,
    /// Combined scalar weight, always > 0
    pub weight: f64,
    pub predictiveness: f64,
    pub consensus_potential: f64,
    pub recency_boost: f64,
    pub pass_rate_penalty: f64,
    /// Cold-start mode only
    pub vote_count_boost: Option<f64>,
    pub mode: WeightMode,
}

/// Ordering strategy selected by poll configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingStrategy {
    /// Identity: stored creation order
    Sequential,
    /// Deterministic seeded shuffle
    Random,
    /// Weighted random without replacement
    Weighted,
}

impl OrderingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderingStrategy::Sequential => "sequential",
            OrderingStrategy::Random => "random",
            OrderingStrategy::Weighted => "weighted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sequential" => Some(OrderingStrategy::Sequential),
            "random" => Some(OrderingStrategy::Random),
            "weighted" => Some(OrderingStrategy::Weighted),
            _ => None,
        }
    }
}

/// Per-poll presentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub poll_id: Uuid,
    pub ordering_strategy: OrderingStrategy,
    pub batch_size: usize,
    pub seed_override: Option<i64>,
}

impl PollConfig {
    /// Defaults used when a poll has no explicit configuration row
    pub fn default_for(poll_id: Uuid) -> Self {
        Self {
            poll_id,
            ordering_strategy: OrderingStrategy::Weighted,
            batch_size: 10,
            seed_override: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_type_round_trips() {
        for t in [
            ClassificationType::PositiveConsensus,
            ClassificationType::NegativeConsensus,
            ClassificationType::Divisive,
            ClassificationType::Bridge,
            ClassificationType::Normal,
        ] {
            assert_eq!(ClassificationType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ClassificationType::parse("bogus"), None);
    }

    #[test]
    fn signed_scale_endpoints() {
        assert_eq!(StatementClassification::signed_agreement(1.0), 100.0);
        assert_eq!(StatementClassification::signed_agreement(0.0), -100.0);
        assert_eq!(StatementClassification::signed_agreement(0.5), 0.0);
    }
}
