//! # Hub Configuration

use std::time::Duration;

/// Tunables for admission, scoring and contingency.
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    /// Maximum age (and future skew) of `captured_at` at arrival.
    pub freshness_window: Duration,
    /// Φ below this moves `NORMAL → WARNING`.
    pub phi_warning_threshold: f64,
    /// How often the liveness sweep runs.
    pub liveness_sweep_interval: Duration,
    /// Silence after which a node is stale.
    pub liveness_timeout: Duration,
    /// Weight of the newest observation in the rolling score (α).
    pub score_smoothing: f64,
    /// Base penalty scaled by the anomaly class multiplier.
    pub anomaly_base_penalty: f64,
    /// Lifetime of an anomaly flag.
    pub anomaly_ttl: Duration,
    /// Fraction of known nodes flagged as pure injection that seals the fleet.
    pub seal_quorum_fraction: f64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(120),
            phi_warning_threshold: 0.70,
            liveness_sweep_interval: Duration::from_secs(10),
            liveness_timeout: Duration::from_secs(90),
            score_smoothing: 0.3,
            anomaly_base_penalty: 0.01,
            anomaly_ttl: Duration::from_secs(600),
            seal_quorum_fraction: 0.5,
        }
    }
}

impl HubConfig {
    /// Short windows for tests driven by a controllable clock.
    pub fn for_testing() -> Self {
        Self {
            freshness_window: Duration::from_secs(60),
            liveness_sweep_interval: Duration::from_millis(20),
            liveness_timeout: Duration::from_secs(30),
            anomaly_ttl: Duration::from_secs(120),
            ..Self::default()
        }
    }

    pub(crate) fn freshness_millis(&self) -> u64 {
        self.freshness_window.as_millis() as u64
    }

    pub(crate) fn liveness_millis(&self) -> u64 {
        self.liveness_timeout.as_millis() as u64
    }
}
