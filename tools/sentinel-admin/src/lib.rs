//! # Sentinel Admin
//!
//! Governance CLI for a running hub. Talks to the admin surface served on
//! the hub's listener:
//!
//! ```text
//! sentinel-admin status                         GET  /health + /api/v1/fleet
//! sentinel-admin seal   --reason "..."          POST /api/v1/governance/seal
//! sentinel-admin reset  --reason "..."          POST /api/v1/governance/reset
//! sentinel-admin anomaly --node ID --density D  POST /api/v1/anomaly
//! ```
//!
//! Mutating commands need the hub's governance token (`SN_GOVERNANCE_TOKEN`).

pub mod api;

pub use api::{ApiError, HubAdminClient};
