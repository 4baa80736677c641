//! # Hub Errors

use shared_crypto::CryptoError;
use shared_types::{LockError, NodeId, Sequence, UnixMillis, WireError};
use thiserror::Error;

/// Why the signature check refused a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UnknownNode,
    BadSignature,
}

/// Why a sequence was refused as a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayKind {
    /// `sequence <= last_sequence`.
    Sequence { last_sequence: Sequence },
    /// Same digest as the last accepted heartbeat.
    RepeatedEntropy,
    /// Captured before the hub restored its ledger, and the node has not
    /// been heard from since.
    BeforeRestore { resumed_at: UnixMillis },
}

/// A single heartbeat was refused. The ledger is untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcceptError {
    #[error("Authentication failed for {node_id}: {reason:?}")]
    Auth {
        node_id: NodeId,
        reason: AuthFailure,
    },

    #[error("Replayed heartbeat {sequence} from {node_id}: {kind:?}")]
    Replay {
        node_id: NodeId,
        sequence: Sequence,
        kind: ReplayKind,
    },

    #[error("Stale heartbeat from {node_id}: captured at {captured_at:?}, hub time {now:?}")]
    Stale {
        node_id: NodeId,
        captured_at: UnixMillis,
        now: UnixMillis,
    },

    #[error("Malformed heartbeat: {0}")]
    Malformed(#[from] WireError),
}

impl AcceptError {
    /// Short label used in metrics and rejection events.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::Replay { .. } => "replay",
            Self::Stale { .. } => "stale",
            Self::Malformed(_) => "malformed",
        }
    }

    /// HTTP status the hub answers with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Auth { .. } => 401,
            Self::Replay { .. } | Self::Stale { .. } => 409,
            Self::Malformed(_) => 400,
        }
    }
}

/// Refused anomaly report or governance action.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GovernanceError {
    #[error("A reason is required")]
    EmptyReason,

    #[error("Density {0} is outside [0, 1]")]
    InvalidDensity(f64),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
}

/// Hub state could not be loaded or saved.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Hub state I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hub state is corrupt: {0}")]
    Corrupt(String),

    #[error("Failed to encode hub state: {0}")]
    Encode(String),

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// The key directory could not be loaded.
#[derive(Debug, Error)]
pub enum KeyDirectoryError {
    #[error("Key directory I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key directory is not a JSON object of hex keys: {0}")]
    Parse(String),

    #[error("Invalid public key for {node_id}: {source}")]
    InvalidKey {
        node_id: NodeId,
        #[source]
        source: CryptoError,
    },
}
