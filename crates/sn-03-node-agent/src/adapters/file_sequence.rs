//! File-backed sequence counter.
//!
//! The file holds the last reserved sequence as decimal text. It is replaced
//! atomically on every reservation and guarded by a lock file for the
//! lifetime of the store.

use crate::domain::errors::SequenceStoreError;
use crate::ports::outbound::SequenceStore;
use parking_lot::Mutex;
use shared_types::{atomic_write, ProcessLock, Sequence};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct FileSequenceStore {
    path: PathBuf,
    last: Mutex<Sequence>,
    _lock: ProcessLock,
}

impl FileSequenceStore {
    /// Open (or create) the counter at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SequenceStoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let lock = ProcessLock::for_state_file(&path)?;

        let last = match fs::read_to_string(&path) {
            Ok(text) => text
                .trim()
                .parse::<Sequence>()
                .map_err(|e| SequenceStoreError::Corrupt(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), last_sequence = last, "Sequence store opened");
        Ok(Self {
            path,
            last: Mutex::new(last),
            _lock: lock,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SequenceStore for FileSequenceStore {
    fn last_used(&self) -> Result<Option<Sequence>, SequenceStoreError> {
        let last = *self.last.lock();
        Ok((last > 0).then_some(last))
    }

    fn reserve_next(&self) -> Result<Sequence, SequenceStoreError> {
        let mut last = self.last.lock();
        let next = last.checked_add(1).ok_or(SequenceStoreError::Exhausted)?;
        atomic_write(&self.path, next.to_string().as_bytes())?;
        *last = next;
        Ok(next)
    }
}
