//! # Sentinel Telemetry
//!
//! Logging and metrics shared by the `sentinel-node` and `sentinel-hub`
//! binaries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sentinel_telemetry::{TelemetryConfig, init_telemetry};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::for_component("hub"))?;
//!     // spans, events and metrics are now collected
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `sentinel` | Service name in logs |
//! | `SN_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `SN_JSON_LOGS` | `false` | JSON log lines |
//! | `SN_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, BACKOFF_DELAY, CAPTURE_FAILURES, CONTINGENCY_LEVEL,
    DELIVERY_ATTEMPTS, FLEET_PHI, HEARTBEATS_ACCEPTED, HEARTBEATS_REJECTED, INTEGRATION_EVENTS,
    NODES_LIVE, NODES_STALE, PROOFS_PRODUCED,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A collector could not be registered or encoded.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Bad filter directive or similar.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
