//! Integration sink backed by the shared event bus.

use crate::ports::outbound::IntegrationSink;
use shared_bus::{EventPublisher, FleetEvent, InMemoryEventBus};
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
pub struct EventBusSink {
    bus: Arc<InMemoryEventBus>,
}

impl EventBusSink {
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }
}

impl IntegrationSink for EventBusSink {
    fn emit(&self, event: FleetEvent) {
        let receivers = self.bus.publish(event);
        trace!(receivers, "Hub event published");
    }
}
