//! Raw noise read from a character device or a capture file.
//!
//! The handle is opened lazily and kept between captures. A regular file is
//! rewound when it runs out, so consecutive samples advance through it. A
//! failed read drops the handle and the next capture reopens the device.

use async_trait::async_trait;
use shared_types::{EntropySample, TimeSource};
use sn_03_node_agent::{CaptureError, EntropySource};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct DeviceNoiseSource {
    device: PathBuf,
    sample_size: usize,
    capture_timeout: Duration,
    time: Arc<dyn TimeSource>,
    handle: Mutex<Option<File>>,
}

impl DeviceNoiseSource {
    pub fn new(
        device: impl Into<PathBuf>,
        sample_size: usize,
        capture_timeout: Duration,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            device: device.into(),
            sample_size,
            capture_timeout,
            time,
            handle: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn device(&self) -> &Path {
        &self.device
    }

    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        let mut guard = self.handle.lock().await;
        if guard.is_none() {
            let file = File::open(&self.device).await.map_err(|e| {
                CaptureError::Unavailable(format!("{}: {}", self.device.display(), e))
            })?;
            debug!(device = %self.device.display(), "Entropy device opened");
            *guard = Some(file);
        }
        let Some(file) = guard.as_mut() else {
            return Err(CaptureError::Unavailable(self.device.display().to_string()));
        };

        let mut buffer = vec![0u8; self.sample_size];
        let result = match file.read_exact(&mut buffer).await {
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                // Capture files wrap; devices never hit EOF.
                match file.seek(SeekFrom::Start(0)).await {
                    Ok(_) => file.read_exact(&mut buffer).await.map(|_| ()),
                    Err(e) => Err(e),
                }
            }
            other => other.map(|_| ()),
        };

        match result {
            Ok(()) => Ok(buffer),
            Err(e) => {
                *guard = None;
                Err(CaptureError::ReadFailed(format!(
                    "{}: {}",
                    self.device.display(),
                    e
                )))
            }
        }
    }
}

#[async_trait]
impl EntropySource for DeviceNoiseSource {
    async fn next_sample(&self) -> Result<EntropySample, CaptureError> {
        let bytes = match tokio::time::timeout(self.capture_timeout, self.capture()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    device = %self.device.display(),
                    timeout_ms = self.capture_timeout.as_millis() as u64,
                    "Entropy capture timed out"
                );
                *self.handle.lock().await = None;
                return Err(CaptureError::Timeout);
            }
        };
        Ok(EntropySample::new(bytes, self.time.now()))
    }
}
