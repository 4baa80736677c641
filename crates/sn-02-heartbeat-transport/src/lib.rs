//! # Heartbeat Transport Subsystem (SN-02)
//!
//! Delivers heartbeats to the hub's onion address over an anonymous,
//! unreliable request/response channel.
//!
//! ## Delivery Rules
//!
//! - One in-flight delivery per node. A newer sequence cancels the older
//!   delivery and waits for it to stop before its own first attempt; an older
//!   or equal sequence is refused as `Outdated`.
//! - Transient failures retry with exponential backoff:
//!   `min(base * 2^(attempt-1), max)`, `503` multiplied by the overload factor.
//! - Success needs an application-level ack (`200` with a parseable body).
//!   `401` and `409` are final.
//!
//! ## Architecture
//!
//! - **Domain** (`domain/`): retry policy, response classification, errors
//! - **Ports** (`ports/`): `HeartbeatDelivery` API, `AnonymousChannel` and
//!   `AttemptObserver` seams
//! - **Service** (`service.rs`): `HeartbeatTransport`
//! - **Adapters** (`adapters/`): `TorHttpChannel` (feature `tor`)

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(feature = "tor")]
pub use adapters::tor::{TorChannelBuildError, TorChannelConfig, TorHttpChannel};
pub use domain::entities::{AttemptEvent, AttemptOutcome, DeliveryReceipt, DeliveryResult};
pub use domain::errors::{ChannelError, RejectReason, TransportError};
pub use domain::retry::RetryPolicy;
pub use domain::status::{classify_response, Verdict};
pub use ports::inbound::HeartbeatDelivery;
pub use ports::outbound::{AnonymousChannel, AttemptObserver, ChannelResponse, NoopObserver};
pub use service::{HeartbeatTransport, TransportStats};
