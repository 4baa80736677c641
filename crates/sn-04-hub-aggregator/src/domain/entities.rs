//! # Hub Entities
//!
//! The hub-owned ledger entry for each node and the fleet snapshot that is
//! both served to operators and persisted across restarts.

use crate::domain::anomaly::{AnomalyClass, AnomalyFlag};
use serde::{Deserialize, Serialize};
use shared_types::{ContingencyState, EntropyDigest, NodeId, Sequence, UnixMillis};
use std::collections::BTreeMap;

/// All node states keyed by id, in a stable order.
pub type NodeLedger = BTreeMap<NodeId, NodeState>;

/// What the hub knows about one node.
///
/// Created on the first valid heartbeat and never removed; a silent node is
/// only marked stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub node_id: NodeId,
    /// Highest accepted sequence.
    pub last_sequence: Sequence,
    /// Hub clock at the last accepted heartbeat.
    pub last_seen_at: UnixMillis,
    /// Exponentially smoothed observation in `[0, 1]`.
    pub rolling_score: f64,
    /// Liveness sweeps in a row that found the node silent.
    pub consecutive_failures: u32,
    pub stale: bool,
    pub last_digest: Option<EntropyDigest>,
    pub anomaly: Option<AnomalyFlag>,
}

impl NodeState {
    /// Ledger entry for a node seen for the first time. Starts at full score.
    #[must_use]
    pub fn new(node_id: NodeId, now: UnixMillis) -> Self {
        Self {
            node_id,
            last_sequence: 0,
            last_seen_at: now,
            rolling_score: 1.0,
            consecutive_failures: 0,
            stale: false,
            last_digest: None,
            anomaly: None,
        }
    }

    /// Penalty of the anomaly flag still in force at `now`.
    #[must_use]
    pub fn active_penalty(&self, now: UnixMillis) -> f64 {
        self.anomaly
            .as_ref()
            .filter(|flag| flag.is_active(now))
            .map_or(0.0, |flag| flag.penalty)
    }

    /// True if the node carries a live flag of `class`.
    #[must_use]
    pub fn flagged_as(&self, class: AnomalyClass, now: UnixMillis) -> bool {
        self.anomaly
            .as_ref()
            .is_some_and(|flag| flag.class == class && flag.is_active(now))
    }

    /// Copy of this entry after accepting a heartbeat.
    #[must_use]
    pub fn accepted(
        &self,
        sequence: Sequence,
        digest: EntropyDigest,
        now: UnixMillis,
        smoothing: f64,
    ) -> Self {
        let observation = 1.0 - self.active_penalty(now);
        let rolling = smoothing * observation + (1.0 - smoothing) * self.rolling_score;
        Self {
            node_id: self.node_id.clone(),
            last_sequence: sequence,
            last_seen_at: now,
            rolling_score: rolling.clamp(0.0, 1.0),
            consecutive_failures: 0,
            stale: false,
            last_digest: Some(digest),
            anomaly: self.anomaly.clone(),
        }
    }

    /// True if nothing was accepted from the node for longer than `timeout_millis`.
    #[must_use]
    pub fn is_silent(&self, now: UnixMillis, timeout_millis: u64) -> bool {
        now.millis_since(self.last_seen_at) > timeout_millis
    }
}

/// Fleet view served at `/api/v1/fleet` and written by the hub store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub phi_score: f64,
    pub contingency: ContingencyState,
    /// Reason given for the last contingency change, if any.
    pub contingency_reason: Option<String>,
    pub known_nodes: usize,
    pub live_nodes: usize,
    pub stale_nodes: usize,
    pub nodes: Vec<NodeState>,
    pub taken_at: UnixMillis,
    /// Ledger revision the snapshot was taken at; grows with every recomputation.
    #[serde(default)]
    pub revision: u64,
}

impl FleetSnapshot {
    pub(crate) fn new(
        ledger: &NodeLedger,
        phi_score: f64,
        contingency: ContingencyState,
        contingency_reason: Option<String>,
        taken_at: UnixMillis,
        revision: u64,
    ) -> Self {
        let stale_nodes = ledger.values().filter(|n| n.stale).count();
        Self {
            phi_score,
            contingency,
            contingency_reason,
            known_nodes: ledger.len(),
            live_nodes: ledger.len() - stale_nodes,
            stale_nodes,
            nodes: ledger.values().cloned().collect(),
            taken_at,
            revision,
        }
    }
}
