//! Hub domain: node ledger entries, scoring policy, contingency latch.

pub mod anomaly;
pub mod config;
pub mod contingency;
pub mod entities;
pub mod errors;
pub mod phi;
