//! Ed25519 signer backed by an in-memory key pair.

use crate::domain::errors::SigningError;
use crate::ports::outbound::Signer;
use async_trait::async_trait;
use shared_crypto::{Ed25519KeyPair, Ed25519PublicKey};
use shared_types::ProofSignature;

/// Deterministic Ed25519 signing with a key loaded at startup.
pub struct Ed25519Signer {
    key_pair: Ed25519KeyPair,
}

impl Ed25519Signer {
    pub fn new(key_pair: Ed25519KeyPair) -> Self {
        Self { key_pair }
    }

    /// Public half, for registering the node in the hub's key directory.
    #[must_use]
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.key_pair.public_key()
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    async fn sign(&self, message: &[u8]) -> Result<ProofSignature, SigningError> {
        Ok(ProofSignature(self.key_pair.sign(message)))
    }
}
