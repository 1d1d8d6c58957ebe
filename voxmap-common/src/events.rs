//! Event types for the Voxmap event system
//!
//! Provides shared event definitions and the EventBus used by all Voxmap
//! services. Events are broadcast via EventBus and can be serialized for
//! SSE transmission.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Voxmap event types
///
/// All services emit through this central enum for type safety and
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VoxmapEvent {
    /// A vote was durably recorded
    VoteRecorded {
        /// Poll the vote belongs to
        poll_id: Uuid,
        /// Voter who cast the vote
        voter_id: Uuid,
        /// Statement voted on
        statement_id: Uuid,
        /// Vote value (-1, 0, 1)
        value: i32,
        /// When the vote was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A landscape recomputation job was enqueued
    ///
    /// Triggers:
    /// - SSE: admin dashboards show "recomputing" state
    ClusteringQueued {
        /// Poll queued for recomputation
        poll_id: Uuid,
        /// What tripped the trigger ("milestone" or "batch_completed")
        reason: String,
        /// When the job was enqueued
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A landscape computation committed successfully
    ///
    /// Triggers:
    /// - SSE: UIs refresh the opinion map
    /// - Weight cache was invalidated as part of this computation
    LandscapeComputed {
        /// Poll whose landscape was replaced
        poll_id: Uuid,
        /// Voters included in the computation
        voter_count: usize,
        /// Statements included in the computation
        statement_count: usize,
        /// Quality tier of the result ("high", "medium", "low")
        quality_tier: String,
        /// When the computation committed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A landscape computation failed (after retries, for operator visibility)
    LandscapeFailed {
        /// Poll whose computation failed
        poll_id: Uuid,
        /// Human-readable failure description
        error: String,
        /// When the failure was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// All cached statement weights for a poll were invalidated
    WeightsInvalidated {
        /// Poll whose weight cache was cleared
        poll_id: Uuid,
        /// When invalidation happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl VoxmapEvent {
    /// Event type name used as the SSE event field
    pub fn event_type(&self) -> &str {
        match self {
            VoxmapEvent::VoteRecorded { .. } => "VoteRecorded",
            VoxmapEvent::ClusteringQueued { .. } => "ClusteringQueued",
            VoxmapEvent::LandscapeComputed { .. } => "LandscapeComputed",
            VoxmapEvent::LandscapeFailed { .. } => "LandscapeFailed",
            VoxmapEvent::WeightsInvalidated { .. } => "WeightsInvalidated",
        }
    }
}

/// Central event distribution bus for application-wide events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VoxmapEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<VoxmapEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: VoxmapEvent,
    ) -> Result<usize, broadcast::error::SendError<VoxmapEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// For non-critical events where it's acceptable if no component is
    /// currently listening.
    pub fn emit_lossy(&self, event: VoxmapEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("EventBus: no subscribers for event");
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit_lossy(VoxmapEvent::WeightsInvalidated {
            poll_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "WeightsInvalidated");
    }

    #[test]
    fn emit_without_subscribers_is_lossy() {
        let bus = EventBus::new(16);
        // Must not panic or error out
        bus.emit_lossy(VoxmapEvent::WeightsInvalidated {
            poll_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        });
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = VoxmapEvent::ClusteringQueued {
            poll_id: Uuid::new_v4(),
            reason: "milestone".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ClusteringQueued\""));
    }
}
