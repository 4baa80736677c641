//! # Error Types
//!
//! Errors shared by every component that touches the heartbeat wire format.

use thiserror::Error;

/// Errors decoding a heartbeat from its wire representation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    /// A hex field contained non-hex characters.
    #[error("Field `{field}` is not valid hex")]
    InvalidHex { field: &'static str },

    /// A hex field decoded to the wrong number of bytes.
    #[error("Field `{field}` has length {actual}, expected {expected}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A required string field was empty.
    #[error("Field `{field}` must not be empty")]
    Empty { field: &'static str },

    /// The body could not be parsed at all.
    #[error("Malformed body: {0}")]
    Malformed(String),
}
