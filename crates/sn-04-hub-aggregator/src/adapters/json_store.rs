//! # JSON File Hub Store
//!
//! One JSON document holding the fleet snapshot. Writes go through a temp file
//! and rename; a sibling `.lock` file keeps a second hub off the same state.
//! A snapshot older than the last one written is skipped, never written over it.

use crate::domain::entities::FleetSnapshot;
use crate::domain::errors::StoreError;
use crate::ports::outbound::HubStore;
use parking_lot::Mutex;
use shared_types::{atomic_write, ProcessLock};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct JsonFileHubStore {
    path: PathBuf,
    _lock: ProcessLock,
    /// Revision of the last snapshot written; held across the write.
    written: Mutex<u64>,
}

impl JsonFileHubStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock = ProcessLock::for_state_file(&path)?;
        info!(path = %path.display(), "Opened hub state file");
        Ok(Self {
            path,
            _lock: lock,
            written: Mutex::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HubStore for JsonFileHubStore {
    fn load(&self) -> Result<Option<FleetSnapshot>, StoreError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn save(&self, snapshot: &FleetSnapshot) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Encode(e.to_string()))?;
        let mut written = self.written.lock();
        if snapshot.revision < *written {
            debug!(
                revision = snapshot.revision,
                written = *written,
                "Skipping hub state older than the file"
            );
            return Ok(());
        }
        atomic_write(&self.path, &encoded)?;
        *written = snapshot.revision;
        debug!(
            path = %self.path.display(),
            bytes = encoded.len(),
            revision = snapshot.revision,
            "Hub state written"
        );
        Ok(())
    }
}
