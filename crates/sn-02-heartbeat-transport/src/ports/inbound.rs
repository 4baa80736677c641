//! # Inbound Ports

use crate::domain::entities::DeliveryResult;
use crate::ports::outbound::AttemptObserver;
use async_trait::async_trait;
use shared_types::Heartbeat;

/// Heartbeat delivery API driven by the node agent.
#[async_trait]
pub trait HeartbeatDelivery: Send + Sync {
    /// Deliver `heartbeat` to `path` on `onion_address`, retrying transient
    /// failures. `observer` sees every attempt of this delivery.
    async fn deliver(
        &self,
        onion_address: &str,
        path: &str,
        heartbeat: Heartbeat,
        observer: &dyn AttemptObserver,
    ) -> DeliveryResult;

    /// Whether the underlying channel can currently carry traffic.
    async fn is_channel_ready(&self) -> bool;
}

#[async_trait]
impl<T: HeartbeatDelivery + ?Sized> HeartbeatDelivery for std::sync::Arc<T> {
    async fn deliver(
        &self,
        onion_address: &str,
        path: &str,
        heartbeat: Heartbeat,
        observer: &dyn AttemptObserver,
    ) -> DeliveryResult {
        (**self)
            .deliver(onion_address, path, heartbeat, observer)
            .await
    }

    async fn is_channel_ready(&self) -> bool {
        (**self).is_channel_ready().await
    }
}
