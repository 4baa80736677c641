//! # Shared Crypto - Attestation Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 + BLAKE3 key derivation | Salted entropy digests |
//! | `signatures` | Ed25519 | Proof signing and verification |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, strict verification
//! - **Salted digests**: per-node salt derived with BLAKE3, so identical noise
//!   never yields the same digest for two nodes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{node_salt, salted_entropy_digest, Hash};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, KEY_LEN, SIGNATURE_LEN};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
