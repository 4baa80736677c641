//! Fakes for agent tests.

use crate::domain::errors::{CaptureError, SequenceStoreError};
use crate::ports::outbound::{EntropySource, SequenceStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{EntropySample, Sequence, UnixMillis};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Replays scripted captures, then yields fresh distinct samples forever.
#[derive(Debug, Default)]
pub struct ScriptedEntropySource {
    script: Mutex<VecDeque<Result<EntropySample, CaptureError>>>,
    produced: AtomicU64,
}

impl ScriptedEntropySource {
    pub fn new(script: Vec<Result<EntropySample, CaptureError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            produced: AtomicU64::new(0),
        }
    }

    pub fn endless() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntropySource for ScriptedEntropySource {
    async fn next_sample(&self) -> Result<EntropySample, CaptureError> {
        if let Some(step) = self.script.lock().pop_front() {
            return step;
        }
        let n = self.produced.fetch_add(1, Ordering::SeqCst);
        let bytes = (0..64u64).map(|i| (n.wrapping_mul(31) ^ i) as u8).collect();
        Ok(EntropySample::new(bytes, UnixMillis::new(1_000 + n)))
    }
}

/// Sequence store kept in memory, optionally failing.
#[derive(Debug, Default)]
pub struct InMemorySequenceStore {
    last: Mutex<Sequence>,
    failing: AtomicBool,
}

impl InMemorySequenceStore {
    pub fn starting_at(last: Sequence) -> Self {
        Self {
            last: Mutex::new(last),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn last_used(&self) -> Result<Option<Sequence>, SequenceStoreError> {
        let last = *self.last.lock();
        Ok((last > 0).then_some(last))
    }

    fn reserve_next(&self) -> Result<Sequence, SequenceStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SequenceStoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        let mut last = self.last.lock();
        *last = last.checked_add(1).ok_or(SequenceStoreError::Exhausted)?;
        Ok(*last)
    }
}
