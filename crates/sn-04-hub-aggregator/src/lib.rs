//! # Hub Aggregator Subsystem (SN-04)
//!
//! Receives heartbeats, keeps one ledger entry per node, scores fleet
//! integrity (Φ) and drives the contingency latch.
//!
//! ## Admission
//!
//! ```text
//! heartbeat ──► signature ──► sequence/digest ──► freshness ──► ledger ──► Φ ──► event
//!                  │401            │409              │409
//! ```
//!
//! A refused heartbeat leaves the ledger untouched. Every recomputation, for
//! any cause, emits exactly one integration event to the injected sink.
//!
//! ## Contingency
//!
//! `NORMAL → WARNING` when Φ falls below the warning threshold, `→ SEALED` on
//! an anomaly quorum or governance command. Only a governance reset goes back
//! to `NORMAL`.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::bus_sink::EventBusSink;
pub use adapters::http::{
    router, AnomalyRequest, GovernanceRequest, HealthResponse, HubHttpState, ANOMALY_PATH,
    FLEET_PATH, HEALTH_PATH, RESET_PATH, SEAL_PATH,
};
pub use adapters::json_store::JsonFileHubStore;
pub use adapters::key_directory::StaticKeyDirectory;
pub use domain::anomaly::{AnomalyClass, AnomalyFlag};
pub use domain::config::HubConfig;
pub use domain::contingency::{ContingencyLatch, Transition};
pub use domain::entities::{FleetSnapshot, NodeLedger, NodeState};
pub use domain::errors::{
    AcceptError, AuthFailure, GovernanceError, KeyDirectoryError, ReplayKind, StoreError,
};
pub use domain::phi::{FreshnessWeightedPolicy, PhiPolicy};
pub use ports::inbound::HubApi;
pub use ports::outbound::{HubStore, IntegrationSink, KeyDirectory};
pub use service::{HubAggregator, HubStats};
