//! # Transport Errors

use shared_types::{Sequence, WireError};
use std::fmt;
use thiserror::Error;

/// Failures reported by an [`AnonymousChannel`](crate::AnonymousChannel).
///
/// All of them are transient from the transport's point of view.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Circuit build failed: {0}")]
    CircuitBuildFailed(String),

    #[error("Attempt timed out")]
    Timeout,

    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    /// The overlay has not finished bootstrapping.
    #[error("Channel not ready")]
    NotReady,

    #[error("Channel error: {0}")]
    Other(String),
}

/// Why the hub refused a heartbeat outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `401`: signature or node identity not accepted.
    Unauthorized,
    /// `409`: replayed or stale.
    Conflict,
    /// Any other non-retryable `4xx`.
    Status(u16),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Unauthorized => f.write_str("unauthorized"),
            RejectReason::Conflict => f.write_str("conflict"),
            RejectReason::Status(code) => write!(f, "status {}", code),
        }
    }
}

/// Final outcome of a delivery that did not produce an ack.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Every attempt failed transiently.
    #[error("Delivery exhausted after {attempts} attempts (overloaded: {overloaded}): {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: String,
        /// The last failure was a `503`.
        overloaded: bool,
    },

    /// The hub answered with a final refusal.
    #[error("Heartbeat rejected ({reason}): {message}")]
    Rejected { reason: RejectReason, message: String },

    /// A newer or equal sequence is already in flight for this node.
    #[error("Sequence {sequence} is outdated, {in_flight} already in flight")]
    Outdated { sequence: Sequence, in_flight: Sequence },

    /// A newer heartbeat for the same node cancelled this delivery.
    #[error("Delivery of sequence {sequence} superseded by {by}")]
    Superseded { sequence: Sequence, by: Sequence },

    /// The heartbeat could not be serialized.
    #[error("Failed to encode heartbeat: {0}")]
    Encode(#[from] WireError),
}

impl TransportError {
    /// True for the `503` exhaustion case, which should widen node backoff.
    #[must_use]
    pub fn is_overload(&self) -> bool {
        matches!(self, TransportError::Exhausted { overloaded: true, .. })
    }
}
