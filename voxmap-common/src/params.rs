//! Global parameter management
//!
//! Centralized singleton for the database-backed clustering tunables.
//! Read-frequently, write-rarely access pattern using RwLock.
//!
//! All tunables are stored in a single `GlobalParams` struct, accessible via
//! the `PARAMS` static singleton:
//! - Single source of truth for clustering configuration
//! - Thread-safe access from handlers and the background worker
//! - Low-contention read access (readers don't block each other)
//!
//! # Usage
//!
//! ```rust
//! use voxmap_common::params::PARAMS;
//!
//! // Read (fast, uncontended)
//! let min_voters = *PARAMS.min_voters.read().unwrap();
//! ```

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// Global parameters singleton
///
/// Initialized once from the settings table, accessed everywhere.
pub static PARAMS: Lazy<GlobalParams> = Lazy::new(GlobalParams::default);

/// Global parameter storage
///
/// All parameters stored with RwLock for thread-safe access.
pub struct GlobalParams {
    /// Minimum distinct voters before clustering is eligible
    ///
    /// Default: 20. Hard floor: polls below it fail fast with InsufficientData.
    pub min_voters: RwLock<usize>,

    /// Minimum approved statements before clustering is eligible
    ///
    /// Default: 6. Hard floor, checked with the voter floor.
    pub min_statements: RwLock<usize>,

    /// Target maximum number of coarse opinion groups
    ///
    /// Default: 5. Fine clusters are agglomerated down to at most this many.
    pub coarse_group_target: RwLock<usize>,

    /// Candidate fine-cluster counts for k-means
    ///
    /// Default: [20, 50, 100]. The largest candidate that fits the voter
    /// count is used; small polls fall back to voters/3 (minimum 2).
    pub fine_k_menu: RwLock<Vec<usize>>,

    /// Strong-agreement threshold in signed percentage points
    ///
    /// Default: 60.0. A group "strongly agrees" with a statement when its
    /// signed agreement exceeds this magnitude.
    pub strong_agreement_threshold: RwLock<f64>,

    /// Group-pair opposition threshold in signed percentage points
    ///
    /// Default: 80.0. Two groups are "opposed" when their mean absolute
    /// agreement gap across the statement set exceeds this.
    pub opposition_threshold: RwLock<f64>,

    /// Recency window for the weighting boost, in days
    ///
    /// Default: 7. Statements newer than the window get a linearly decaying
    /// presentation boost.
    pub recency_window_days: RwLock<f64>,

    /// Vote-count milestones that trigger background reclustering
    ///
    /// Default: [10, 20, 50, 100, 200, 500].
    pub vote_milestones: RwLock<Vec<usize>>,

    /// Default statement batch size for ordering/trigger logic
    ///
    /// Default: 10. The final batch may be shorter.
    pub default_batch_size: RwLock<usize>,

    /// Background worker poll interval in milliseconds
    ///
    /// Default: 2000.
    pub worker_poll_interval_ms: RwLock<u64>,

    /// Defensive per-computation timeout in seconds
    ///
    /// Default: 120. PCA/k-means cost grows with voter and statement counts.
    pub compute_timeout_secs: RwLock<u64>,

    /// Landscape read-cache TTL in seconds
    ///
    /// Default: 30.
    pub landscape_cache_ttl_secs: RwLock<u64>,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            min_voters: RwLock::new(20),
            min_statements: RwLock::new(6),
            coarse_group_target: RwLock::new(5),
            fine_k_menu: RwLock::new(vec![20, 50, 100]),
            strong_agreement_threshold: RwLock::new(60.0),
            opposition_threshold: RwLock::new(80.0),
            recency_window_days: RwLock::new(7.0),
            vote_milestones: RwLock::new(vec![10, 20, 50, 100, 200, 500]),
            default_batch_size: RwLock::new(10),
            worker_poll_interval_ms: RwLock::new(2000),
            compute_timeout_secs: RwLock::new(120),
            landscape_cache_ttl_secs: RwLock::new(30),
        }
    }
}

impl GlobalParams {
    /// Load overrides from the settings table (key/value TEXT pairs)
    ///
    /// Unknown keys are ignored; malformed values are logged and skipped so a
    /// bad row never prevents startup.
    pub async fn load_from_db(&self, pool: &sqlx::SqlitePool) -> crate::Result<()> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM settings WHERE key LIKE 'clustering.%'")
                .fetch_all(pool)
                .await?;

        for (key, value) in rows {
            match key.as_str() {
                "clustering.min_voters" => Self::apply(&self.min_voters, &key, &value),
                "clustering.min_statements" => Self::apply(&self.min_statements, &key, &value),
                "clustering.coarse_group_target" => {
                    Self::apply(&self.coarse_group_target, &key, &value)
                }
                "clustering.strong_agreement_threshold" => {
                    Self::apply(&self.strong_agreement_threshold, &key, &value)
                }
                "clustering.opposition_threshold" => {
                    Self::apply(&self.opposition_threshold, &key, &value)
                }
                "clustering.recency_window_days" => {
                    Self::apply(&self.recency_window_days, &key, &value)
                }
                "clustering.default_batch_size" => {
                    Self::apply(&self.default_batch_size, &key, &value)
                }
                "clustering.worker_poll_interval_ms" => {
                    Self::apply(&self.worker_poll_interval_ms, &key, &value)
                }
                "clustering.compute_timeout_secs" => {
                    Self::apply(&self.compute_timeout_secs, &key, &value)
                }
                "clustering.landscape_cache_ttl_secs" => {
                    Self::apply(&self.landscape_cache_ttl_secs, &key, &value)
                }
                _ => tracing::debug!(key = %key, "Ignoring unknown clustering setting"),
            }
        }

        Ok(())
    }

    fn apply<T: std::str::FromStr>(slot: &RwLock<T>, key: &str, value: &str) {
        match value.parse::<T>() {
            Ok(parsed) => *slot.write().unwrap() = parsed,
            Err(_) => {
                tracing::warn!(key = %key, value = %value, "Malformed clustering setting, keeping default")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operational_values() {
        let params = GlobalParams::default();
        assert_eq!(*params.min_voters.read().unwrap(), 20);
        assert_eq!(*params.min_statements.read().unwrap(), 6);
        assert_eq!(*params.coarse_group_target.read().unwrap(), 5);
        assert_eq!(
            *params.vote_milestones.read().unwrap(),
            vec![10, 20, 50, 100, 200, 500]
        );
        assert_eq!(*params.default_batch_size.read().unwrap(), 10);
    }
}
