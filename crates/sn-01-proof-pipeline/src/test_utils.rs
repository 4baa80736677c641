//! Deterministic fakes for tests in this and downstream crates.

use crate::domain::errors::SigningError;
use crate::ports::outbound::{Digester, Signer};
use async_trait::async_trait;
use shared_types::{EntropyDigest, EntropySample, NodeId, ProofSignature, UnixMillis};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Digester that ignores its input.
#[derive(Debug, Clone, Copy)]
pub struct FixedDigester(pub [u8; 32]);

impl FixedDigester {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Digester for FixedDigester {
    fn digest(&self, _node_id: &NodeId, _sample: &[u8]) -> EntropyDigest {
        EntropyDigest(self.0)
    }
}

/// Signer whose keystore is never reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSigner;

#[async_trait]
impl Signer for UnavailableSigner {
    async fn sign(&self, _message: &[u8]) -> Result<ProofSignature, SigningError> {
        Err(SigningError::Unavailable("keystore locked".into()))
    }
}

/// Signer that can be switched off and on, and counts calls.
#[derive(Debug, Default)]
pub struct ToggleSigner {
    failing: AtomicBool,
    calls: AtomicU64,
}

impl ToggleSigner {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for ToggleSigner {
    async fn sign(&self, message: &[u8]) -> Result<ProofSignature, SigningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SigningError::Unavailable("toggled off".into()));
        }
        let mut signature = [0u8; 64];
        for (i, b) in message.iter().enumerate() {
            signature[i % 64] ^= b;
        }
        Ok(ProofSignature(signature))
    }
}

/// A pseudo-random sample that passes the default health screen.
///
/// Same `seed` gives the same bytes.
pub fn noisy_sample(seed: u64, captured_at: u64) -> EntropySample {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let bytes = (0..512)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect();
    EntropySample::new(bytes, UnixMillis::new(captured_at))
}
