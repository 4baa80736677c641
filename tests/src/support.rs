//! Shared fixtures for the integration suites.

use async_trait::async_trait;
use rand::RngCore;
use shared_types::{ErrorBody, HEARTBEAT_PATH};
use sn_02_heartbeat_transport::{AnonymousChannel, ChannelError, ChannelResponse};
use sn_04_hub_aggregator::HubApi;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// [`AnonymousChannel`] that hands bodies straight to an in-process hub and
/// answers with the status codes the HTTP surface would use.
pub struct HubLoopbackChannel {
    hub: Arc<dyn HubApi>,
    failures_left: AtomicU32,
    posts: AtomicUsize,
}

impl HubLoopbackChannel {
    pub fn new(hub: Arc<dyn HubApi>) -> Self {
        Self {
            hub,
            failures_left: AtomicU32::new(0),
            posts: AtomicUsize::new(0),
        }
    }

    /// Drop the next `count` posts with a connection reset.
    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }
}

fn json_response(status: u16, body: Vec<u8>) -> ChannelResponse {
    ChannelResponse { status, body }
}

#[async_trait]
impl AnonymousChannel for HubLoopbackChannel {
    async fn post(
        &self,
        _onion_address: &str,
        path: &str,
        body: Vec<u8>,
    ) -> Result<ChannelResponse, ChannelError> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        let dropped = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if dropped {
            return Err(ChannelError::ConnectionReset("circuit collapsed".into()));
        }
        if path != HEARTBEAT_PATH {
            let body = serde_json::to_vec(&ErrorBody::new("not found")).unwrap_or_default();
            return Ok(json_response(404, body));
        }

        match self.hub.on_heartbeat_body(&body) {
            Ok(ack) => Ok(json_response(200, serde_json::to_vec(&ack).unwrap_or_default())),
            Err(e) => {
                let body = serde_json::to_vec(&ErrorBody::new(e.to_string())).unwrap_or_default();
                Ok(json_response(e.status_code(), body))
            }
        }
    }

    async fn is_ready(&self) -> bool {
        true
    }
}

/// Fill `path` with `len` random bytes, standing in for a camera device.
pub fn write_noise_file(path: &Path, len: usize) -> std::io::Result<()> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    std::fs::write(path, bytes)
}

/// Poll `condition` every 10ms for up to `timeout`.
pub async fn eventually<F>(timeout: std::time::Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
