//! Salted SHA-256 digester.

use crate::ports::outbound::Digester;
use shared_crypto::salted_entropy_digest;
use shared_types::{EntropyDigest, NodeId};

/// `SHA-256(tag || BLAKE3-derive-key(node_id) || sample)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digester;

impl Digester for Sha256Digester {
    fn digest(&self, node_id: &NodeId, sample: &[u8]) -> EntropyDigest {
        EntropyDigest(salted_entropy_digest(node_id.as_bytes(), sample))
    }
}
