//! Errors raised while decoding keys or checking proof signatures.

use thiserror::Error;

/// Failure in key handling or signature verification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Decoded key material had the wrong size.
    #[error("key must be {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required size in bytes.
        expected: usize,
        /// Size that was supplied.
        actual: usize,
    },

    /// Key material was not valid hex.
    #[error("key is not valid hex: {0}")]
    InvalidEncoding(String),

    /// The signature does not match the message under this key.
    #[error("signature does not verify")]
    SignatureVerificationFailed,

    /// The bytes do not encode a point on the curve.
    #[error("not a valid Ed25519 public key")]
    InvalidPublicKey,
}
