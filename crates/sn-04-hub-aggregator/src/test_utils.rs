//! Fakes and signed fixtures for hub tests.

use crate::adapters::key_directory::StaticKeyDirectory;
use crate::domain::entities::FleetSnapshot;
use crate::domain::errors::StoreError;
use crate::ports::outbound::{HubStore, IntegrationSink};
use parking_lot::Mutex;
use shared_bus::FleetEvent;
use shared_crypto::Ed25519KeyPair;
use shared_types::{
    ContingencyState, EntropyDigest, Heartbeat, IntegrationEvent, NodeId, Proof, ProofSignature,
    Sequence, UnixMillis,
};

/// Sink that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FleetEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<FleetEvent> {
        self.events.lock().clone()
    }

    pub fn integration_events(&self) -> Vec<IntegrationEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                FleetEvent::Integration(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// `(node_id, sequence, reason)` of every rejection.
    pub fn rejections(&self) -> Vec<(NodeId, Sequence, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                FleetEvent::HeartbeatRejected {
                    node_id,
                    sequence,
                    reason,
                } => Some((node_id.clone(), *sequence, reason.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn stale_nodes(&self) -> Vec<NodeId> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                FleetEvent::NodeMarkedStale { node_id, .. } => Some(node_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn contingency_changes(&self) -> Vec<(ContingencyState, ContingencyState)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                FleetEvent::ContingencyChanged { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }
}

impl IntegrationSink for RecordingSink {
    fn emit(&self, event: FleetEvent) {
        self.events.lock().push(event);
    }
}

/// Store that keeps the last snapshot in memory.
#[derive(Debug, Default)]
pub struct InMemoryHubStore {
    saved: Mutex<Option<FleetSnapshot>>,
    saves: Mutex<u64>,
}

impl InMemoryHubStore {
    pub fn last_saved(&self) -> Option<FleetSnapshot> {
        self.saved.lock().clone()
    }

    pub fn saves(&self) -> u64 {
        *self.saves.lock()
    }
}

impl HubStore for InMemoryHubStore {
    fn load(&self) -> Result<Option<FleetSnapshot>, StoreError> {
        Ok(self.saved.lock().clone())
    }

    fn save(&self, snapshot: &FleetSnapshot) -> Result<(), StoreError> {
        *self.saved.lock() = Some(snapshot.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// Registered nodes with deterministic keys `sentinel-00`, `sentinel-01`, ...
pub struct FleetFixture {
    nodes: Vec<(NodeId, Ed25519KeyPair)>,
}

impl FleetFixture {
    pub fn new(size: usize) -> Self {
        let nodes = (0..size)
            .map(|index| {
                let mut seed = [0u8; 32];
                seed[..8].copy_from_slice(&(index as u64 + 1).to_be_bytes());
                (
                    NodeId::new(format!("sentinel-{index:02}")),
                    Ed25519KeyPair::from_seed(seed),
                )
            })
            .collect();
        Self { nodes }
    }

    pub fn node_id(&self, index: usize) -> NodeId {
        self.nodes[index].0.clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn key_pair(&self, index: usize) -> &Ed25519KeyPair {
        &self.nodes[index].1
    }

    /// The fleet in key directory file format.
    pub fn directory_json(&self) -> String {
        let entries: std::collections::BTreeMap<String, String> = self
            .nodes
            .iter()
            .map(|(node_id, keys)| (node_id.to_string(), keys.public_key().to_hex()))
            .collect();
        serde_json::to_string_pretty(&entries).unwrap_or_default()
    }

    pub fn directory(&self) -> StaticKeyDirectory {
        let mut directory = StaticKeyDirectory::new();
        for (node_id, keys) in &self.nodes {
            directory.insert(node_id.clone(), keys.public_key());
        }
        directory
    }

    /// Digest unique to `(index, sequence)`.
    pub fn digest(index: usize, sequence: Sequence) -> EntropyDigest {
        let mut bytes = [0xA5u8; 32];
        bytes[..8].copy_from_slice(&(index as u64).to_be_bytes());
        bytes[8..16].copy_from_slice(&sequence.to_be_bytes());
        EntropyDigest(bytes)
    }

    pub fn heartbeat(&self, index: usize, sequence: Sequence, captured_at: UnixMillis) -> Heartbeat {
        self.heartbeat_with_digest(index, sequence, Self::digest(index, sequence), captured_at)
    }

    pub fn heartbeat_with_digest(
        &self,
        index: usize,
        sequence: Sequence,
        digest: EntropyDigest,
        captured_at: UnixMillis,
    ) -> Heartbeat {
        let (node_id, keys) = &self.nodes[index];
        signed(node_id.clone(), keys, sequence, digest, captured_at)
    }

    /// Heartbeat for node `index` signed with a key the hub does not know.
    pub fn forged(&self, index: usize, sequence: Sequence, captured_at: UnixMillis) -> Heartbeat {
        let impostor = Ed25519KeyPair::from_seed([0xEE; 32]);
        signed(
            self.node_id(index),
            &impostor,
            sequence,
            Self::digest(index, sequence),
            captured_at,
        )
    }
}

fn signed(
    node_id: NodeId,
    keys: &Ed25519KeyPair,
    sequence: Sequence,
    digest: EntropyDigest,
    captured_at: UnixMillis,
) -> Heartbeat {
    let message = Proof::signing_message(&node_id, sequence, &digest, captured_at);
    let signature = ProofSignature(keys.sign(&message));
    Heartbeat::new(
        Proof::new(node_id, sequence, digest, signature, captured_at),
        "CAMERA_NOISE",
    )
}
