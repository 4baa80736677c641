//! # Shared Types Crate
//!
//! The data model shared by sensor nodes and the hub: identities, proofs,
//! heartbeats, the heartbeat wire format and fleet-level events.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses the node/hub
//!   boundary is defined here.
//! - **Immutable Proofs**: a `Proof` cannot be altered after construction;
//!   its signed bytes come from one canonical encoder.
//! - **Hex on the wire**: digests and signatures travel as lowercase hex.

pub mod entities;
pub mod errors;
pub mod persistence;
pub mod rate_limiter;
pub mod time;
pub mod wire;

pub use entities::*;
pub use errors::*;
pub use persistence::{atomic_write, LockError, ProcessLock};
pub use rate_limiter::RateLimiter;
pub use time::{SystemTimeSource, TimeSource};
pub use wire::{ErrorBody, HeartbeatWire, HEARTBEAT_PATH};

#[cfg(any(test, feature = "test-utils"))]
pub use time::ControllableTimeSource;
