//! # Node Agent Subsystem (SN-03)
//!
//! One cooperative loop per sensor node:
//!
//! ```text
//! IDLE ──► CAPTURING ──► PROVING ──► SENDING ──► IDLE
//!                                      │   ▲
//!                                      ▼   │
//!                                    BACKOFF ──► DEGRADED
//! ```
//!
//! The agent owns the node's sequence counter. A sequence is reserved and
//! persisted before proving, so a crash or a failed cycle never reuses one.
//! While `DEGRADED` the agent keeps capturing on a widened interval.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::file_sequence::FileSequenceStore;
pub use domain::entities::{AgentConfig, AgentPhase, AgentStatus};
pub use domain::errors::{AgentError, CaptureError, SequenceStoreError};
pub use ports::outbound::{EntropySource, SequenceStore};
pub use service::NodeAgent;
