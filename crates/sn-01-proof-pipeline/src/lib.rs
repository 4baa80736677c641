//! # Proof Pipeline Subsystem (SN-01)
//!
//! Turns one raw entropy sample into a signed [`Proof`](shared_types::Proof).
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): entropy health screen and error types, no I/O
//! - **Ports Layer** (`ports/`): `Digester` and `Signer` capabilities plus the
//!   `ProofProducer` API
//! - **Service Layer** (`service.rs`): `ProofPipeline`, the stateless transform
//! - **Adapters** (`adapters/`): salted SHA-256 digester and Ed25519 signer
//!
//! ## Flow
//!
//! ```text
//! sample ──► health screen ──► digest(node_id, sample) ──► sign(message) ──► Proof
//! ```
//!
//! The sample is consumed by value and dropped once the digest exists.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::ed25519::Ed25519Signer;
pub use adapters::sha256::Sha256Digester;
pub use domain::errors::{DigestError, PipelineError, SigningError};
pub use domain::health::{EntropyHealthConfig, HealthViolation};
pub use ports::inbound::ProofProducer;
pub use ports::outbound::{Digester, Signer};
pub use service::{PipelineStats, ProofPipeline};
