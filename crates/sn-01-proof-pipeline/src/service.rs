//! # Proof Pipeline Service
//!
//! Implements [`ProofProducer`] on top of injected `Digester` and `Signer`
//! capabilities.

use crate::domain::errors::{DigestError, PipelineError};
use crate::domain::health::EntropyHealthConfig;
use crate::ports::inbound::ProofProducer;
use crate::ports::outbound::{Digester, Signer};
use async_trait::async_trait;
use shared_types::{EntropyDigest, EntropySample, NodeId, Proof, Sequence};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Snapshot of pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub proofs_produced: u64,
    pub digest_failures: u64,
    pub signing_failures: u64,
}

#[derive(Default)]
struct Counters {
    proofs_produced: AtomicU64,
    digest_failures: AtomicU64,
    signing_failures: AtomicU64,
}

/// Stateless sample → proof transform.
pub struct ProofPipeline<D: Digester, S: Signer> {
    digester: D,
    signer: S,
    health: EntropyHealthConfig,
    counters: Counters,
}

impl<D: Digester, S: Signer> ProofPipeline<D, S> {
    /// Create a pipeline with the default health screen.
    pub fn new(digester: D, signer: S) -> Self {
        Self::with_health(digester, signer, EntropyHealthConfig::default())
    }

    pub fn with_health(digester: D, signer: S, health: EntropyHealthConfig) -> Self {
        Self {
            digester,
            signer,
            health,
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            proofs_produced: self.counters.proofs_produced.load(Ordering::Relaxed),
            digest_failures: self.counters.digest_failures.load(Ordering::Relaxed),
            signing_failures: self.counters.signing_failures.load(Ordering::Relaxed),
        }
    }

    fn condition(
        &self,
        node_id: &NodeId,
        sample: &EntropySample,
    ) -> Result<EntropyDigest, DigestError> {
        if sample.is_empty() {
            return Err(DigestError::EmptySample);
        }
        self.health.check(sample.bytes())?;
        Ok(self.digester.digest(node_id, sample.bytes()))
    }
}

#[async_trait]
impl<D: Digester, S: Signer> ProofProducer for ProofPipeline<D, S> {
    async fn produce_proof(
        &self,
        node_id: &NodeId,
        sequence: Sequence,
        sample: EntropySample,
    ) -> Result<Proof, PipelineError> {
        let captured_at = sample.captured_at();
        let digest = match self.condition(node_id, &sample) {
            Ok(digest) => digest,
            Err(e) => {
                self.counters.digest_failures.fetch_add(1, Ordering::Relaxed);
                warn!(node_id = %node_id, sequence, error = %e, "Sample rejected before digest");
                return Err(e.into());
            }
        };
        // The raw sample must not outlive its digest.
        drop(sample);

        let message = Proof::signing_message(node_id, sequence, &digest, captured_at);
        let signature = match self.signer.sign(&message).await {
            Ok(signature) => signature,
            Err(e) => {
                self.counters.signing_failures.fetch_add(1, Ordering::Relaxed);
                warn!(node_id = %node_id, sequence, error = %e, "Signing failed");
                return Err(e.into());
            }
        };

        self.counters.proofs_produced.fetch_add(1, Ordering::Relaxed);
        debug!(node_id = %node_id, sequence, digest = %digest.to_hex(), "Proof produced");

        Ok(Proof::new(
            node_id.clone(),
            sequence,
            digest,
            signature,
            captured_at,
        ))
    }
}
