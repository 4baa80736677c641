//! # Agent Errors

use shared_types::LockError;
use sn_01_proof_pipeline::PipelineError;
use sn_02_heartbeat_transport::TransportError;
use thiserror::Error;

/// The entropy source could not produce a sample.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Entropy device unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read entropy: {0}")]
    ReadFailed(String),

    #[error("Entropy capture timed out")]
    Timeout,
}

/// The sequence counter could not be read or advanced.
#[derive(Debug, Error)]
pub enum SequenceStoreError {
    #[error("Sequence file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sequence file is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Sequence space exhausted")]
    Exhausted,
}

/// Why one agent cycle did not end in a delivered heartbeat.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Sequence store failed: {0}")]
    Sequence(#[from] SequenceStoreError),

    #[error("Proof pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Delivery failed: {0}")]
    Transport(#[from] TransportError),
}

impl AgentError {
    /// Errors after which the node stops sending until a cycle succeeds.
    #[must_use]
    pub fn degrades(&self) -> bool {
        use sn_02_heartbeat_transport::RejectReason;
        match self {
            AgentError::Capture(_) => false,
            AgentError::Sequence(_) | AgentError::Pipeline(_) => true,
            AgentError::Transport(TransportError::Exhausted { .. }) => true,
            AgentError::Transport(TransportError::Rejected {
                reason: RejectReason::Unauthorized,
                ..
            }) => true,
            AgentError::Transport(_) => false,
        }
    }
}
