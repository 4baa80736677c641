//! Hub admin API access.

pub mod client;

pub use client::{ApiError, HubAdminClient};
