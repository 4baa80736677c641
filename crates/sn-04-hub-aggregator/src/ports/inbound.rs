//! # Inbound Ports
//!
//! What the HTTP surface and the runtime's background tasks call.

use crate::domain::entities::FleetSnapshot;
use crate::domain::errors::{AcceptError, GovernanceError, StoreError};
use shared_types::{Heartbeat, HubAck, IntegrationEvent, NodeId};

pub trait HubApi: Send + Sync {
    /// Admit one decoded heartbeat.
    fn on_heartbeat(&self, heartbeat: Heartbeat) -> Result<HubAck, AcceptError>;

    /// Decode a JSON wire body, then admit it.
    fn on_heartbeat_body(&self, body: &[u8]) -> Result<HubAck, AcceptError>;

    /// Flag a node with an externally detected phantom density.
    fn report_anomaly(
        &self,
        node_id: &NodeId,
        density: f64,
    ) -> Result<IntegrationEvent, GovernanceError>;

    /// Force `SEALED`.
    fn governance_seal(&self, reason: &str) -> Result<IntegrationEvent, GovernanceError>;

    /// Return to `NORMAL`.
    fn governance_reset(&self, reason: &str) -> Result<IntegrationEvent, GovernanceError>;

    /// Mark silent nodes stale, expire anomaly flags, recompute Φ.
    fn sweep_liveness(&self) -> IntegrationEvent;

    fn snapshot(&self) -> FleetSnapshot;

    /// Flush the ledger to the store.
    fn persist(&self) -> Result<(), StoreError>;
}
