//! # Pipeline Errors
//!
//! A failed pipeline run never produces a partial proof.

use crate::domain::health::HealthViolation;
use thiserror::Error;

/// The sample could not be conditioned into a digest.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DigestError {
    /// Zero-length sample.
    #[error("Entropy sample is empty")]
    EmptySample,

    /// The sample failed the statistical health screen (stuck or covered sensor).
    #[error("Entropy sample failed health screen: {0}")]
    LowEntropy(HealthViolation),
}

/// The signing capability could not produce a signature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SigningError {
    /// Keystore locked, missing or otherwise unreachable.
    #[error("Signing capability unavailable: {0}")]
    Unavailable(String),

    /// The capability refused to sign this message.
    #[error("Signing capability rejected the message: {0}")]
    Rejected(String),
}

/// Errors from [`ProofPipeline::produce_proof`](crate::ProofPipeline::produce_proof).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Digest(#[from] DigestError),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl PipelineError {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Digest(DigestError::EmptySample) => "empty_sample",
            PipelineError::Digest(DigestError::LowEntropy(_)) => "low_entropy",
            PipelineError::Signing(SigningError::Unavailable(_)) => "signer_unavailable",
            PipelineError::Signing(SigningError::Rejected(_)) => "signer_rejected",
        }
    }
}
