//! # Sentinel Runtime
//!
//! Process-level assembly for both sides of the fleet:
//!
//! - [`node::NodeRuntime`]: entropy device → proof pipeline → heartbeat
//!   transport, driven by the node agent
//! - [`hub::HubRuntime`]: heartbeat admission, Φ scoring, contingency latch,
//!   admin surface and `/metrics`
//!
//! Configuration is one [`container::SentinelConfig`] shared by both binaries.

pub mod adapters;
pub mod container;
pub mod hub;
pub mod node;
pub mod wiring;

pub use container::{ConfigError, SentinelConfig};
pub use hub::{HubRuntime, SentinelHub, METRICS_PATH};
pub use node::{NodeRuntime, SentinelAgent};
