//! # Inbound Ports
//!
//! The API the node agent drives.

use crate::domain::errors::PipelineError;
use async_trait::async_trait;
use shared_types::{EntropySample, NodeId, Proof, Sequence};

/// Produces signed proofs from raw samples.
///
/// Deterministic for a given `(node_id, sample)` up to the signature, and
/// free of side effects apart from statistics.
#[async_trait]
pub trait ProofProducer: Send + Sync {
    /// Condition `sample` into a digest and sign it for `(node_id, sequence)`.
    ///
    /// # Errors
    /// - `DigestError` for an empty or unhealthy sample
    /// - `SigningError` if the signing capability is unavailable or refuses
    async fn produce_proof(
        &self,
        node_id: &NodeId,
        sequence: Sequence,
        sample: EntropySample,
    ) -> Result<Proof, PipelineError>;
}

#[async_trait]
impl<T: ProofProducer + ?Sized> ProofProducer for std::sync::Arc<T> {
    async fn produce_proof(
        &self,
        node_id: &NodeId,
        sequence: Sequence,
        sample: EntropySample,
    ) -> Result<Proof, PipelineError> {
        (**self).produce_proof(node_id, sequence, sample).await
    }
}
