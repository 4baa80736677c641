//! # Entropy Hashing
//!
//! Digest primitives for conditioning raw sensor noise.
//!
//! ## Construction
//!
//! ```text
//! salt   = BLAKE3-derive-key(SALT_CONTEXT, node_id)
//! digest = SHA-256(ENTROPY_DOMAIN_TAG || salt || sample)
//! ```
//!
//! The per-node salt makes a leaked sample useless for any other node's claim.

use blake3::Hasher;
use sha2::{Digest, Sha256};

/// 256-bit hash output.
pub type Hash = [u8; 32];

/// BLAKE3 key-derivation context for per-node entropy salts.
pub const SALT_CONTEXT: &str = "sentinel-fleet 2024 entropy salt v1";

/// Domain separation tag prefixed to every entropy digest input.
pub const ENTROPY_DOMAIN_TAG: &[u8] = b"sentinel-entropy-v1";

/// Derive the per-node salt from a node identifier.
pub fn node_salt(node_id: &[u8]) -> Hash {
    let mut hasher = Hasher::new_derive_key(SALT_CONTEXT);
    hasher.update(node_id);
    *hasher.finalize().as_bytes()
}

/// Salted SHA-256 digest of a raw entropy sample.
pub fn salted_entropy_digest(node_id: &[u8], sample: &[u8]) -> Hash {
    let salt = node_salt(node_id);
    let mut hasher = Sha256::new();
    hasher.update(ENTROPY_DOMAIN_TAG);
    hasher.update(salt);
    hasher.update(sample);
    hasher.finalize().into()
}
