//! # Fleet Events
//!
//! Every event that flows from the hub to its observers (alert consumers,
//! dashboards, metrics exporters).

use serde::{Deserialize, Serialize};
use shared_types::{ContingencyState, IntegrationEvent, NodeId, RecomputeCause};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FleetEvent {
    /// Φ was recomputed. Emitted after every recomputation, changed or not.
    Integration(IntegrationEvent),

    /// A heartbeat was refused by the hub.
    HeartbeatRejected {
        /// Claimed sender.
        node_id: NodeId,
        /// Claimed sequence.
        sequence: u64,
        /// Short machine-readable reason (`auth`, `replay`, `stale`, ...).
        reason: String,
    },

    /// The liveness sweep marked a node stale.
    NodeMarkedStale {
        /// The silent node.
        node_id: NodeId,
        /// Consecutive sweeps the node has been missing.
        consecutive_failures: u32,
    },

    /// The contingency level moved.
    ContingencyChanged {
        /// Previous level.
        from: ContingencyState,
        /// New level.
        to: ContingencyState,
        /// What drove the change.
        cause: RecomputeCause,
    },
}

impl FleetEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::Integration(_) => EventTopic::Integrity,
            Self::HeartbeatRejected { .. } => EventTopic::Admission,
            Self::NodeMarkedStale { .. } => EventTopic::Liveness,
            Self::ContingencyChanged { .. } => EventTopic::Contingency,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Φ recomputations.
    Integrity,
    /// Heartbeat admission outcomes.
    Admission,
    /// Liveness sweep results.
    Liveness,
    /// Contingency transitions.
    Contingency,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &FleetEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
