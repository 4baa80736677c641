//! # Runtime Container
//!
//! Configuration loading and the conversions into per-subsystem settings.

pub mod config;

pub use config::{ConfigError, SentinelConfig, CONFIG_PATH_ENV};
