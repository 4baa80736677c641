//! # Event Publisher
//!
//! Publishing never waits: the bus is a bounded `tokio::sync::broadcast`
//! ring, so a slow subscriber loses its oldest events instead of applying
//! back-pressure to the scoring path.

use crate::events::{EventFilter, FleetEvent};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Sink for fleet events. `publish` is synchronous and must never block.
pub trait EventPublisher: Send + Sync {
    /// Hand `event` to every current subscriber; returns how many there were.
    fn publish(&self, event: FleetEvent) -> usize;

    /// Events accepted since the bus was created.
    fn events_published(&self) -> u64;
}

/// Process-local fan-out shared by the hub and its observers.
pub struct InMemoryEventBus {
    tx: broadcast::Sender<FleetEvent>,
    capacity: usize,
    published: AtomicU64,
    unobserved: AtomicU64,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Ring of `capacity` events per subscriber (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            capacity,
            published: AtomicU64::new(0),
            unobserved: AtomicU64::new(0),
        }
    }

    /// Attach a subscriber. It sees only events published after this call.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, subscribers = self.tx.receiver_count() + 1, "Fleet event subscriber attached");
        Subscription::new(self.tx.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events published while nobody was listening.
    #[must_use]
    pub fn events_unobserved(&self) -> u64 {
        self.unobserved.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: FleetEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let topic = event.topic();
        let receivers = self.tx.send(event).unwrap_or_else(|_| {
            self.unobserved.fetch_add(1, Ordering::Relaxed);
            0
        });
        trace!(?topic, receivers, "Fleet event published");
        receivers
    }

    fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
