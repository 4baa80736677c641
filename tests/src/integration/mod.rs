//! Cross-crate scenarios.

pub mod e2e_loopback;
pub mod fleet_scenarios;
pub mod node_to_hub;
