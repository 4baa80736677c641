//! # Wiring
//!
//! Glue between the subsystem crates and the process: alert consumption
//! and the Prometheus bridge.
//!
//! ```text
//!   hub ──► IntegrationSink ──► InMemoryEventBus ──┬──► AlertConsumer
//!                                                  └──► run_hub_metrics
//!   transport ──► TransportMetricsObserver
//!   agent status watch ──► run_agent_metrics
//! ```

pub mod alerts;
pub mod metrics_bridge;

pub use alerts::{Alert, AlertConsumer, SealAction, DEFAULT_ALERT_THRESHOLD};
pub use metrics_bridge::{
    record_fleet_event, record_snapshot, run_agent_metrics, run_hub_metrics, OverloadTally,
    TransportMetricsObserver,
};
