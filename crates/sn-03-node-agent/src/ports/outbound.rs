//! # Outbound Ports

use crate::domain::errors::{CaptureError, SequenceStoreError};
use async_trait::async_trait;
use shared_types::{EntropySample, Sequence};

/// Pull-based source of raw physical noise. One sample per cycle.
#[async_trait]
pub trait EntropySource: Send + Sync {
    async fn next_sample(&self) -> Result<EntropySample, CaptureError>;
}

/// Durable, never-reusing sequence counter.
pub trait SequenceStore: Send + Sync {
    /// Last reserved sequence, if any.
    fn last_used(&self) -> Result<Option<Sequence>, SequenceStoreError>;

    /// Reserve the next sequence and persist it before returning.
    fn reserve_next(&self) -> Result<Sequence, SequenceStoreError>;
}

#[async_trait]
impl<T: EntropySource + ?Sized> EntropySource for std::sync::Arc<T> {
    async fn next_sample(&self) -> Result<EntropySample, CaptureError> {
        (**self).next_sample().await
    }
}

impl<T: SequenceStore + ?Sized> SequenceStore for std::sync::Arc<T> {
    fn last_used(&self) -> Result<Option<Sequence>, SequenceStoreError> {
        (**self).last_used()
    }

    fn reserve_next(&self) -> Result<Sequence, SequenceStoreError> {
        (**self).reserve_next()
    }
}
