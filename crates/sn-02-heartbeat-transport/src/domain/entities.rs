//! # Delivery Entities

use crate::domain::errors::TransportError;
use shared_types::{HubAck, NodeId, Sequence};
use std::time::Duration;

/// Proof of a successful delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    /// The hub's acknowledgment.
    pub ack: HubAck,
    /// 1-based number of the attempt that succeeded.
    pub attempts: u32,
    /// Delays slept between attempts, in order.
    pub backoff_delays: Vec<Duration>,
}

pub type DeliveryResult = Result<DeliveryReceipt, TransportError>;

/// How one attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Delivered,
    Transient,
    Overload,
    Rejected,
}

impl AttemptOutcome {
    /// Metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Delivered => "delivered",
            AttemptOutcome::Transient => "transient",
            AttemptOutcome::Overload => "overload",
            AttemptOutcome::Rejected => "rejected",
        }
    }
}

/// Reported to observers after every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptEvent {
    pub node_id: NodeId,
    pub sequence: Sequence,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// Set when the transport is about to sleep before another attempt.
    pub next_delay: Option<Duration>,
}
