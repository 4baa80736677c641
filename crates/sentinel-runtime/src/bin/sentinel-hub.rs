//! Fleet hub daemon.

use anyhow::{Context, Result};
use sentinel_runtime::{HubRuntime, SentinelConfig};
use sentinel_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_component("hub"))
        .context("failed to initialize telemetry")?;

    let config = SentinelConfig::load()?;
    let runtime = HubRuntime::start(&config).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutdown signal received");

    runtime.shutdown().await
}
