//! Prometheus metrics for Sentinel Fleet.
//!
//! All metrics follow the naming convention: `sn_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., heartbeats_accepted_total)
//! - **Gauge**: Value that can go up or down (e.g., fleet_phi_ratio)
//! - **Histogram**: Distribution of values (e.g., backoff_delay_seconds)

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // HUB METRICS
    // =========================================================================

    /// Heartbeats that passed auth, replay and freshness checks
    pub static ref HEARTBEATS_ACCEPTED: Counter = Counter::new(
        "sn_hub_heartbeats_accepted_total",
        "Total heartbeats accepted by the hub"
    ).expect("metric creation failed");

    /// Heartbeats refused, by reason
    pub static ref HEARTBEATS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("sn_hub_heartbeats_rejected_total", "Total heartbeats rejected by the hub"),
        &["reason"]  // reason: auth/replay/stale/malformed/overload
    ).expect("metric creation failed");

    /// Current fleet integrity score
    pub static ref FLEET_PHI: Gauge = Gauge::new(
        "sn_hub_fleet_phi_ratio",
        "Fleet integrity score in [0, 1]"
    ).expect("metric creation failed");

    /// Current contingency level (0 normal, 1 warning, 2 sealed)
    pub static ref CONTINGENCY_LEVEL: Gauge = Gauge::new(
        "sn_hub_contingency_level",
        "Contingency latch level: 0 NORMAL, 1 WARNING, 2 SEALED"
    ).expect("metric creation failed");

    /// Nodes reporting within the liveness timeout
    pub static ref NODES_LIVE: Gauge = Gauge::new(
        "sn_hub_nodes_live",
        "Number of known nodes that are not stale"
    ).expect("metric creation failed");

    /// Nodes marked stale by the liveness sweep
    pub static ref NODES_STALE: Gauge = Gauge::new(
        "sn_hub_nodes_stale",
        "Number of known nodes marked stale"
    ).expect("metric creation failed");

    /// Integration events emitted, by cause
    pub static ref INTEGRATION_EVENTS: CounterVec = CounterVec::new(
        Opts::new("sn_hub_integration_events_total", "Integration events emitted"),
        &["cause"]  // cause: heartbeat/liveness_sweep/anomaly/governance
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSPORT METRICS
    // =========================================================================

    /// Delivery attempts, by outcome
    pub static ref DELIVERY_ATTEMPTS: CounterVec = CounterVec::new(
        Opts::new("sn_transport_delivery_attempts_total", "Heartbeat delivery attempts"),
        &["outcome"]  // outcome: delivered/transient/overload/rejected
    ).expect("metric creation failed");

    /// Backoff delays slept between attempts
    pub static ref BACKOFF_DELAY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "sn_transport_backoff_delay_seconds",
            "Delay slept before a delivery retry"
        ).buckets(vec![0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 60.0, 120.0])
    ).expect("metric creation failed");

    // =========================================================================
    // NODE METRICS
    // =========================================================================

    /// Proofs produced by the pipeline
    pub static ref PROOFS_PRODUCED: Counter = Counter::new(
        "sn_node_proofs_produced_total",
        "Total proofs produced by the node pipeline"
    ).expect("metric creation failed");

    /// Failed entropy captures
    pub static ref CAPTURE_FAILURES: Counter = Counter::new(
        "sn_node_capture_failures_total",
        "Total entropy capture failures"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Hub
        Box::new(HEARTBEATS_ACCEPTED.clone()),
        Box::new(HEARTBEATS_REJECTED.clone()),
        Box::new(FLEET_PHI.clone()),
        Box::new(CONTINGENCY_LEVEL.clone()),
        Box::new(NODES_LIVE.clone()),
        Box::new(NODES_STALE.clone()),
        Box::new(INTEGRATION_EVENTS.clone()),
        // Transport
        Box::new(DELIVERY_ATTEMPTS.clone()),
        Box::new(BACKOFF_DELAY.clone()),
        // Node
        Box::new(PROOFS_PRODUCED.clone()),
        Box::new(CAPTURE_FAILURES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
