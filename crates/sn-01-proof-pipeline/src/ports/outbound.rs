//! # Outbound Ports
//!
//! Cryptographic capabilities injected into the pipeline.

use crate::domain::errors::SigningError;
use async_trait::async_trait;
use shared_types::{EntropyDigest, NodeId, ProofSignature};

/// Deterministic, collision-resistant conditioning of a raw sample.
///
/// Identical `(node_id, sample)` must always give the identical digest, and
/// the digest must depend on `node_id` so two nodes never collide on the
/// same noise.
pub trait Digester: Send + Sync {
    fn digest(&self, node_id: &NodeId, sample: &[u8]) -> EntropyDigest;
}

/// Signing capability holding the node's private key.
///
/// Async because real keystores (hardware-backed, remote) may suspend.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign the canonical proof message.
    async fn sign(&self, message: &[u8]) -> Result<ProofSignature, SigningError>;
}

#[async_trait]
impl<T: Signer + ?Sized> Signer for std::sync::Arc<T> {
    async fn sign(&self, message: &[u8]) -> Result<ProofSignature, SigningError> {
        (**self).sign(message).await
    }
}
