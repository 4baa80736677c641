//! # Adapters
//!
//! Production implementations of the outbound ports.

pub mod ed25519;
pub mod sha256;
