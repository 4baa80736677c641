//! # Core Domain Entities
//!
//! Defines the entities that flow between a sensor node and the hub.
//!
//! ## Clusters
//!
//! - **Identity**: `NodeId`, `Sequence`, `UnixMillis`
//! - **Attestation**: `EntropySample`, `EntropyDigest`, `ProofSignature`, `Proof`, `Heartbeat`
//! - **Fleet**: `ContingencyState`, `HubAck`, `IntegrationEvent`

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::errors::WireError;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Per-node heartbeat sequence number.
pub type Sequence = u64;

/// Unique identifier of a sensor node, as declared in its heartbeats.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap a node identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes of the identifier (used for salting and signing).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixMillis(pub u64);

impl UnixMillis {
    /// Create a timestamp from raw milliseconds.
    #[must_use]
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Raw milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, zero if `earlier` is later.
    #[must_use]
    pub const fn millis_since(&self, earlier: UnixMillis) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Add a number of milliseconds.
    #[must_use]
    pub const fn plus(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

// =============================================================================
// CLUSTER B: ATTESTATION
// =============================================================================

/// A raw noise buffer captured from a physical sensor.
///
/// Ephemeral: it is consumed by value by the proof pipeline and never
/// retained once its digest exists.
#[derive(Clone, PartialEq, Eq)]
pub struct EntropySample {
    bytes: Vec<u8>,
    captured_at: UnixMillis,
}

impl EntropySample {
    /// Wrap a captured buffer.
    pub fn new(bytes: Vec<u8>, captured_at: UnixMillis) -> Self {
        Self { bytes, captured_at }
    }

    /// Raw noise bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Capture timestamp.
    #[must_use]
    pub fn captured_at(&self) -> UnixMillis {
        self.captured_at
    }

    /// Number of bytes in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Sample contents are deliberately not printed.
impl fmt::Debug for EntropySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntropySample")
            .field("len", &self.bytes.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// A 32-byte entropy digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntropyDigest(pub [u8; 32]);

impl EntropyDigest {
    /// Lowercase hex rendering used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(value: &str) -> Result<Self, WireError> {
        let bytes = hex::decode(value).map_err(|_| WireError::InvalidHex { field: "hash" })?;
        let array: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| WireError::InvalidLength {
            field: "hash",
            expected: 32,
            actual: v.len(),
        })?;
        Ok(Self(array))
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for EntropyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntropyDigest({})", self.to_hex())
    }
}

impl Serialize for EntropyDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EntropyDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(de::Error::custom)
    }
}

/// A 64-byte detached signature over a proof.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProofSignature(pub [u8; 64]);

impl ProofSignature {
    /// Lowercase hex rendering used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 128-character hex string.
    pub fn from_hex(value: &str) -> Result<Self, WireError> {
        let bytes =
            hex::decode(value).map_err(|_| WireError::InvalidHex { field: "signature" })?;
        let array: [u8; 64] = bytes.try_into().map_err(|v: Vec<u8>| WireError::InvalidLength {
            field: "signature",
            expected: 64,
            actual: v.len(),
        })?;
        Ok(Self(array))
    }

    /// Raw signature bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for ProofSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProofSignature({}..)", &self.to_hex()[..16])
    }
}

/// Domain separation tag for the signed proof message.
pub const PROOF_DOMAIN_TAG: &[u8] = b"sentinel-proof-v1";

/// A signed statement that a node produced a given entropy digest.
///
/// Immutable once constructed; all fields are reachable only through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    node_id: NodeId,
    sequence: Sequence,
    entropy_digest: EntropyDigest,
    signature: ProofSignature,
    captured_at: UnixMillis,
}

impl Proof {
    /// Assemble a proof from already-computed parts.
    pub fn new(
        node_id: NodeId,
        sequence: Sequence,
        entropy_digest: EntropyDigest,
        signature: ProofSignature,
        captured_at: UnixMillis,
    ) -> Self {
        Self {
            node_id,
            sequence,
            entropy_digest,
            signature,
            captured_at,
        }
    }

    /// Canonical bytes covered by the proof signature.
    ///
    /// Layout: tag || u32be(len(node_id)) || node_id || u64be(sequence)
    /// || digest || u64be(captured_at).
    #[must_use]
    pub fn signing_message(
        node_id: &NodeId,
        sequence: Sequence,
        entropy_digest: &EntropyDigest,
        captured_at: UnixMillis,
    ) -> Vec<u8> {
        let id = node_id.as_bytes();
        let mut message = Vec::with_capacity(PROOF_DOMAIN_TAG.len() + 4 + id.len() + 8 + 32 + 8);
        message.extend_from_slice(PROOF_DOMAIN_TAG);
        message.extend_from_slice(&(id.len() as u32).to_be_bytes());
        message.extend_from_slice(id);
        message.extend_from_slice(&sequence.to_be_bytes());
        message.extend_from_slice(entropy_digest.as_bytes());
        message.extend_from_slice(&captured_at.as_millis().to_be_bytes());
        message
    }

    /// The bytes this proof's signature must verify against.
    #[must_use]
    pub fn message(&self) -> Vec<u8> {
        Self::signing_message(
            &self.node_id,
            self.sequence,
            &self.entropy_digest,
            self.captured_at,
        )
    }

    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    #[must_use]
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    #[must_use]
    pub fn entropy_digest(&self) -> &EntropyDigest {
        &self.entropy_digest
    }

    #[must_use]
    pub fn signature(&self) -> &ProofSignature {
        &self.signature
    }

    #[must_use]
    pub fn captured_at(&self) -> UnixMillis {
        self.captured_at
    }
}

/// One signed proof submission from a node, with its declared entropy source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    /// The signed proof.
    pub proof: Proof,
    /// Declared physical source label, e.g. `CAMERA_NOISE`.
    pub entropy_source: String,
}

impl Heartbeat {
    /// Wrap a proof for transport.
    pub fn new(proof: Proof, entropy_source: impl Into<String>) -> Self {
        Self {
            proof,
            entropy_source: entropy_source.into(),
        }
    }

    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        self.proof.node_id()
    }

    #[must_use]
    pub fn sequence(&self) -> Sequence {
        self.proof.sequence()
    }
}

// =============================================================================
// CLUSTER C: FLEET
// =============================================================================

/// Fleet-wide contingency level.
///
/// Ordered `Normal < Warning < Sealed`; automatic transitions only move up.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContingencyState {
    #[default]
    Normal,
    Warning,
    Sealed,
}

impl ContingencyState {
    /// Wire label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ContingencyState::Normal => "NORMAL",
            ContingencyState::Warning => "WARNING",
            ContingencyState::Sealed => "SEALED",
        }
    }

    /// Numeric level for gauges (0, 1, 2).
    #[must_use]
    pub const fn level(&self) -> u8 {
        match self {
            ContingencyState::Normal => 0,
            ContingencyState::Warning => 1,
            ContingencyState::Sealed => 2,
        }
    }
}

impl fmt::Display for ContingencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-level acknowledgment returned by the hub on acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HubAck {
    pub phi_score: f64,
    pub contingency: ContingencyState,
}

/// What caused a fleet score recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputeCause {
    Heartbeat,
    LivenessSweep,
    Anomaly,
    Governance,
}

impl RecomputeCause {
    /// Metric and log label, matching the serde name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecomputeCause::Heartbeat => "heartbeat",
            RecomputeCause::LivenessSweep => "liveness_sweep",
            RecomputeCause::Anomaly => "anomaly",
            RecomputeCause::Governance => "governance",
        }
    }
}

/// Event emitted to alert/dashboard consumers after every Φ recomputation.
///
/// Consumers do their own threshold-crossing detection; the hub never
/// suppresses repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEvent {
    /// Φ after the recomputation.
    pub new_phi_score: f64,
    /// True while the fleet is sealed.
    pub contingency_activated: bool,
    /// Node whose update triggered the recomputation, if any.
    pub node_id: Option<NodeId>,
    /// Full contingency level.
    pub contingency: ContingencyState,
    pub cause: RecomputeCause,
    pub emitted_at: UnixMillis,
}
