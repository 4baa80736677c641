//! # Agent Entities

use shared_types::{HubAck, NodeId, Sequence, HEARTBEAT_PATH};
use std::fmt;
use std::time::Duration;

/// Where the agent loop currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AgentPhase {
    #[default]
    Idle,
    Capturing,
    Proving,
    Sending,
    Backoff,
    Degraded,
}

impl AgentPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AgentPhase::Idle => "IDLE",
            AgentPhase::Capturing => "CAPTURING",
            AgentPhase::Proving => "PROVING",
            AgentPhase::Sending => "SENDING",
            AgentPhase::Backoff => "BACKOFF",
            AgentPhase::Degraded => "DEGRADED",
        }
    }
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local status, published on a `watch` channel after every transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentStatus {
    pub phase: AgentPhase,
    /// True once a cycle has failed in a way that stops sends.
    pub degraded: bool,
    pub degraded_reason: Option<String>,
    pub channel_ready: bool,
    pub last_sequence: Option<Sequence>,
    pub last_ack: Option<HubAck>,
    pub consecutive_failures: u32,
    pub capture_failures: u64,
    pub proofs_produced: u64,
    pub heartbeats_delivered: u64,
}

/// Node agent settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub node_id: NodeId,
    pub hub_onion_address: String,
    pub heartbeat_path: String,
    /// Declared entropy source label, e.g. `CAMERA_NOISE`.
    pub entropy_source: String,
    pub heartbeat_interval: Duration,
    /// Interval factor while degraded.
    pub degraded_interval_multiplier: u32,
    /// Poll period while waiting for the channel to become ready.
    pub readiness_poll: Duration,
    /// First delay after a capture failure; doubles up to the heartbeat interval.
    pub capture_retry_base: Duration,
}

impl AgentConfig {
    pub fn new(node_id: NodeId, hub_onion_address: impl Into<String>) -> Self {
        Self {
            node_id,
            hub_onion_address: hub_onion_address.into(),
            heartbeat_path: HEARTBEAT_PATH.to_string(),
            entropy_source: "CAMERA_NOISE".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            degraded_interval_multiplier: 4,
            readiness_poll: Duration::from_secs(5),
            capture_retry_base: Duration::from_secs(1),
        }
    }

    pub fn for_testing(node_id: &str) -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(20),
            readiness_poll: Duration::from_millis(5),
            capture_retry_base: Duration::from_millis(2),
            ..Self::new(NodeId::new(node_id), "hubtestaddress.onion")
        }
    }

    /// Sleep before the next cycle.
    #[must_use]
    pub fn next_interval(&self, degraded: bool, capture_failures_in_row: u32) -> Duration {
        if capture_failures_in_row > 0 {
            let exponent = (capture_failures_in_row - 1).min(31);
            return self
                .capture_retry_base
                .saturating_mul(1u32 << exponent)
                .min(self.heartbeat_interval);
        }
        if degraded {
            return self
                .heartbeat_interval
                .saturating_mul(self.degraded_interval_multiplier.max(1));
        }
        self.heartbeat_interval
    }
}
