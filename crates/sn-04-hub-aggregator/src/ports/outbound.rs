//! # Outbound Ports

use crate::domain::entities::FleetSnapshot;
use crate::domain::errors::StoreError;
use shared_bus::FleetEvent;
use shared_crypto::Ed25519PublicKey;
use shared_types::NodeId;
use std::sync::Arc;

/// Registered node public keys.
pub trait KeyDirectory: Send + Sync {
    fn public_key(&self, node_id: &NodeId) -> Option<Ed25519PublicKey>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Non-blocking destination for hub events.
///
/// `emit` must never block or fail; a slow consumer loses events instead.
pub trait IntegrationSink: Send + Sync {
    fn emit(&self, event: FleetEvent);
}

/// Durable hub state.
pub trait HubStore: Send + Sync {
    fn load(&self) -> Result<Option<FleetSnapshot>, StoreError>;

    fn save(&self, snapshot: &FleetSnapshot) -> Result<(), StoreError>;
}

impl<T: KeyDirectory + ?Sized> KeyDirectory for Arc<T> {
    fn public_key(&self, node_id: &NodeId) -> Option<Ed25519PublicKey> {
        (**self).public_key(node_id)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

impl<T: IntegrationSink + ?Sized> IntegrationSink for Arc<T> {
    fn emit(&self, event: FleetEvent) {
        (**self).emit(event);
    }
}

impl<T: HubStore + ?Sized> HubStore for Arc<T> {
    fn load(&self) -> Result<Option<FleetSnapshot>, StoreError> {
        (**self).load()
    }

    fn save(&self, snapshot: &FleetSnapshot) -> Result<(), StoreError> {
        (**self).save(snapshot)
    }
}
