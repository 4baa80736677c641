//! # Heartbeat Wire Format
//!
//! JSON bodies exchanged over the anonymous channel:
//!
//! ```text
//! POST <onion_address>/api/v1/heartbeat
//! { "node_id": string, "sequence": uint64, "entropy_source": string,
//!   "hash": hex-string, "signature": hex-string, "captured_at": unix-ms }
//! ```
//!
//! Responses: `200` with [`HubAck`], `401` auth failure, `409` replay/stale,
//! `503` hub overload, `400` malformed body.

use serde::{Deserialize, Serialize};

use crate::entities::{
    EntropyDigest, Heartbeat, HubAck, NodeId, Proof, ProofSignature, UnixMillis,
};
use crate::errors::WireError;

/// Path the hub serves heartbeats on.
pub const HEARTBEAT_PATH: &str = "/api/v1/heartbeat";

/// Heartbeat as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatWire {
    pub node_id: String,
    pub sequence: u64,
    pub entropy_source: String,
    pub hash: String,
    pub signature: String,
    pub captured_at: u64,
}

impl From<&Heartbeat> for HeartbeatWire {
    fn from(heartbeat: &Heartbeat) -> Self {
        let proof = &heartbeat.proof;
        Self {
            node_id: proof.node_id().as_str().to_string(),
            sequence: proof.sequence(),
            entropy_source: heartbeat.entropy_source.clone(),
            hash: proof.entropy_digest().to_hex(),
            signature: proof.signature().to_hex(),
            captured_at: proof.captured_at().as_millis(),
        }
    }
}

impl TryFrom<HeartbeatWire> for Heartbeat {
    type Error = WireError;

    fn try_from(wire: HeartbeatWire) -> Result<Self, Self::Error> {
        if wire.node_id.is_empty() {
            return Err(WireError::Empty { field: "node_id" });
        }
        let digest = EntropyDigest::from_hex(&wire.hash)?;
        let signature = ProofSignature::from_hex(&wire.signature)?;
        let proof = Proof::new(
            NodeId::new(wire.node_id),
            wire.sequence,
            digest,
            signature,
            UnixMillis::new(wire.captured_at),
        );
        Ok(Heartbeat::new(proof, wire.entropy_source))
    }
}

impl HeartbeatWire {
    /// Encode as a JSON body.
    pub fn to_json(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(|e| WireError::Malformed(e.to_string()))
    }

    /// Decode a JSON body.
    pub fn from_json(body: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(body).map_err(|e| WireError::Malformed(e.to_string()))
    }
}

impl HubAck {
    /// Decode an acknowledgment body.
    pub fn from_json(body: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(body).map_err(|e| WireError::Malformed(e.to_string()))
    }
}

/// Body returned with every non-200 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Decode an error body.
    pub fn from_json(body: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(body).map_err(|e| WireError::Malformed(e.to_string()))
    }
}
