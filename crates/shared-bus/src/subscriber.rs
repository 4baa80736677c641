//! # Event Subscriber
//!
//! A filtered view over the broadcast ring. Lag never surfaces as an error:
//! the skipped count is folded into [`Subscription::dropped`] and reading
//! resumes at the oldest event still buffered.

use crate::events::{EventFilter, FleetEvent};
use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Every publisher handle is gone.
    #[error("event bus closed")]
    Closed,
}

/// Receiving end handed out by [`InMemoryEventBus::subscribe`].
///
/// Dropping it detaches from the bus.
///
/// [`InMemoryEventBus::subscribe`]: crate::InMemoryEventBus::subscribe
pub struct Subscription {
    rx: Receiver<FleetEvent>,
    filter: EventFilter,
    dropped: u64,
    delivered: u64,
}

impl Subscription {
    pub(crate) fn new(rx: Receiver<FleetEvent>, filter: EventFilter) -> Self {
        Self {
            rx,
            filter,
            dropped: 0,
            delivered: 0,
        }
    }

    /// Wait for the next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<FleetEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    self.dropped += skipped;
                    warn!(skipped, total_dropped = self.dropped, "Fleet event subscriber fell behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already buffered.
    pub fn try_recv(&mut self) -> Result<Option<FleetEvent>, SubscriptionError> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Ok(Some(event));
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => self.dropped += skipped,
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Events lost to lag since subscribing.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Matching events handed to the caller so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    fn accept(&mut self, event: FleetEvent) -> Option<FleetEvent> {
        if self.filter.matches(&event) {
            self.delivered += 1;
            Some(event)
        } else {
            None
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(
            topics = ?self.filter.topics,
            delivered = self.delivered,
            dropped = self.dropped,
            "Fleet event subscription closed"
        );
    }
}
