//! # Outbound Ports

use crate::domain::entities::AttemptEvent;
use crate::domain::errors::ChannelError;
use async_trait::async_trait;

/// Raw response from the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Opaque request/response channel to an onion address.
///
/// Circuit management is entirely the implementation's business.
#[async_trait]
pub trait AnonymousChannel: Send + Sync {
    async fn post(
        &self,
        onion_address: &str,
        path: &str,
        body: Vec<u8>,
    ) -> Result<ChannelResponse, ChannelError>;

    async fn is_ready(&self) -> bool;
}

/// Hook notified after each delivery attempt.
pub trait AttemptObserver: Send + Sync {
    fn on_attempt(&self, event: &AttemptEvent);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AttemptObserver for NoopObserver {
    fn on_attempt(&self, _event: &AttemptEvent) {}
}

impl<F> AttemptObserver for F
where
    F: Fn(&AttemptEvent) + Send + Sync,
{
    fn on_attempt(&self, event: &AttemptEvent) {
        self(event)
    }
}
