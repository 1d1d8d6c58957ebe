//! Clustering trigger evaluation
//!
//! Decides, after each recorded vote, whether a recomputation job should be
//! queued for the poll. Two independent conditions, either is sufficient:
//!
//! - Vote-count milestone: the poll's total vote count has just reached one
//!   of a fixed set of thresholds
//! - Batch completion: the voter has just finished a presentation batch
//!
//! Queueing is deduplicated at the database layer (at most one pending or
//! running job per poll), so firing the trigger repeatedly is harmless.

use crate::db;
use crate::models::PollConfig;
use sqlx::SqlitePool;
use uuid::Uuid;
use voxmap_common::events::{EventBus, VoxmapEvent};
use voxmap_common::params::PARAMS;

/// Outcome of one trigger evaluation, for logging and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// A job was queued for this reason
    Queued(TriggerReason),
    /// The conditions fired but a job was already pending or running
    AlreadyQueued(TriggerReason),
    /// Nothing fired
    NotTriggered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    Milestone(usize),
    BatchCompleted,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::Milestone(_) => "milestone",
            TriggerReason::BatchCompleted => "batch_completed",
        }
    }
}

/// Evaluate trigger conditions after a vote lands
///
/// `voter_id` is the voter whose vote was just recorded; their personal
/// vote count drives the batch-completion check while the poll-wide count
/// drives the milestone check.
pub async fn evaluate_after_vote(
    pool: &SqlitePool,
    event_bus: &EventBus,
    poll_id: Uuid,
    voter_id: Uuid,
) -> anyhow::Result<TriggerDecision> {
    let config = db::polls::get_poll_config(pool, poll_id).await?;

    let reason = if let Some(milestone) = milestone_reached(pool, poll_id).await? {
        Some(TriggerReason::Milestone(milestone))
    } else if batch_completed(pool, poll_id, voter_id, &config).await? {
        Some(TriggerReason::BatchCompleted)
    } else {
        None
    };

    let Some(reason) = reason else {
        return Ok(TriggerDecision::NotTriggered);
    };

    match db::jobs::enqueue(pool, poll_id).await? {
        Some(job_id) => {
            tracing::info!(
                poll_id = %poll_id,
                job_id = %job_id,
                reason = reason.as_str(),
                "Clustering job queued"
            );
            event_bus.emit_lossy(VoxmapEvent::ClusteringQueued {
                poll_id,
                reason: reason.as_str().to_string(),
                timestamp: chrono::Utc::now(),
            });
            Ok(TriggerDecision::Queued(reason))
        }
        None => Ok(TriggerDecision::AlreadyQueued(reason)),
    }
}

/// A milestone fires only on the vote that lands exactly on it, so a poll
/// crossing 100 does not re-fire 10, 20, and 50
async fn milestone_reached(pool: &SqlitePool, poll_id: Uuid) -> anyhow::Result<Option<usize>> {
    let total = db::votes::count_poll_votes(pool, poll_id).await?;
    let milestones = PARAMS.vote_milestones.read().unwrap().clone();
    Ok(hit_milestone(total, &milestones))
}

/// Pure form of the milestone check, for direct testing
fn hit_milestone(total: usize, milestones: &[usize]) -> Option<usize> {
    milestones.iter().copied().find(|m| *m == total)
}

/// The voter just completed a batch when their position within the current
/// batch equals the batch's size. The final batch may be short (fewer
/// statements remain than the configured batch size), so the check is
/// against the actual size, not the configured one.
async fn batch_completed(
    pool: &SqlitePool,
    poll_id: Uuid,
    voter_id: Uuid,
    config: &PollConfig,
) -> anyhow::Result<bool> {
    let votes = db::votes::count_voter_votes(pool, poll_id, voter_id).await?;
    if votes == 0 {
        return Ok(false);
    }
    let statements = db::statements::count_approved_statements(pool, poll_id).await?;
    Ok(is_batch_boundary(votes, statements, config.batch_size))
}

/// Pure form of the batch-completion rule, for direct testing
fn is_batch_boundary(votes: usize, statement_count: usize, batch_size: usize) -> bool {
    if votes == 0 || batch_size == 0 {
        return false;
    }
    let batch_index = (votes - 1) / batch_size;
    let batch_start = batch_index * batch_size;
    let this_batch_size = batch_size.min(statement_count.saturating_sub(batch_start));
    let position_in_batch = votes - batch_start;
    this_batch_size > 0 && position_in_batch == this_batch_size
}
