//! # Shared Bus - Fleet Event Bus
//!
//! Fan-out of hub events to observers such as the alert consumer, the
//! metrics exporter and dashboards.
//!
//! ```text
//!  HubAggregator ──publish()──► InMemoryEventBus (bounded ring)
//!                                  │
//!          ┌───────────────────────┼──────────────────────┐
//!          ▼                       ▼                      ▼
//!   AlertConsumer           metrics bridge         operator tooling
//!   [Integrity]             [all topics]           [any filter]
//! ```
//!
//! ## Delivery
//!
//! - Publishing is synchronous and never blocks the scoring path.
//! - The channel is bounded. A subscriber that falls behind loses the
//!   oldest events and sees its `dropped()` counter grow.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, FleetEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

