//! Sensor node daemon.

use anyhow::{Context, Result};
use sentinel_runtime::{NodeRuntime, SentinelConfig};
use sentinel_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_component("node"))
        .context("failed to initialize telemetry")?;

    let config = SentinelConfig::load()?;
    let mut runtime = NodeRuntime::from_config(&config)?;
    runtime.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutdown signal received");

    runtime.shutdown().await;
    Ok(())
}
