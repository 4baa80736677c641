//! # Sentinel Configuration
//!
//! One TOML document with `[node]`, `[retry]` and `[hub]` sections. Loading
//! order: built-in defaults, then the file named by `SN_CONFIG` (if any), then
//! `SN_*` environment variables, then validation.
//!
//! ```toml
//! [node]
//! node_id = "sentinel-07"
//! hub_onion_address = "fleethubxyz.onion"
//!
//! [retry]
//! retry_max_attempts = 8
//!
//! [hub]
//! phi_warning_threshold = 0.75
//! ```

use serde::{Deserialize, Serialize};
use sn_02_heartbeat_transport::{RetryPolicy, TorChannelConfig};
use sn_03_node_agent::AgentConfig;
use sn_04_hub_aggregator::HubConfig;
use shared_types::{NodeId, HEARTBEAT_PATH};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the TOML file.
pub const CONFIG_PATH_ENV: &str = "SN_CONFIG";

/// Largest accepted sample, one mebibyte.
const MAX_SAMPLE_SIZE: usize = 1 << 20;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}", path = .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(String),

    #[error("Environment variable {key} has invalid value {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete configuration for both binaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SentinelConfig {
    pub node: NodeSection,
    pub retry: RetrySection,
    pub hub: HubSection,
}

/// Sensor node settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeSection {
    pub node_id: String,
    pub hub_onion_address: String,
    /// Declared source label sent with every heartbeat.
    pub entropy_source: String,
    /// Device or file that yields raw noise.
    pub entropy_device: PathBuf,
    pub sample_size: usize,
    pub capture_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub degraded_interval_multiplier: u32,
    pub readiness_poll_ms: u64,
    pub sequence_file: PathBuf,
    /// Hex Ed25519 seed. `SN_NODE_KEY_SEED` takes precedence.
    pub signing_key_file: Option<PathBuf>,
    /// Tor SOCKS listener; empty posts directly (loopback development only).
    pub socks_proxy: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            hub_onion_address: String::new(),
            entropy_source: "CAMERA_NOISE".to_string(),
            entropy_device: PathBuf::from("/dev/video0"),
            sample_size: 4096,
            capture_timeout_ms: 5_000,
            heartbeat_interval_ms: 30_000,
            degraded_interval_multiplier: 4,
            readiness_poll_ms: 5_000,
            sequence_file: PathBuf::from("./data/node/sequence"),
            signing_key_file: None,
            socks_proxy: "127.0.0.1:9050".to_string(),
        }
    }
}

/// Heartbeat delivery retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_max_attempts: u32,
    pub attempt_timeout_ms: u64,
    pub overload_multiplier: u32,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            retry_base_delay_ms: 2_000,
            retry_max_delay_ms: 60_000,
            retry_max_attempts: 6,
            attempt_timeout_ms: 30_000,
            overload_multiplier: 2,
        }
    }
}

/// Hub settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubSection {
    pub listen_addr: String,
    pub freshness_window_ms: u64,
    pub phi_warning_threshold: f64,
    pub liveness_sweep_interval_ms: u64,
    pub liveness_timeout_ms: u64,
    pub score_smoothing: f64,
    pub anomaly_base_penalty: f64,
    pub anomaly_ttl_ms: u64,
    pub seal_quorum_fraction: f64,
    pub key_directory_file: PathBuf,
    pub state_file: PathBuf,
    pub persist_interval_ms: u64,
    /// Bearer token for governance endpoints; empty disables them.
    pub governance_token: String,
    pub max_heartbeats_per_sec: u64,
    pub event_buffer: usize,
}

impl Default for HubSection {
    fn default() -> Self {
        let hub = HubConfig::default();
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            freshness_window_ms: hub.freshness_window.as_millis() as u64,
            phi_warning_threshold: hub.phi_warning_threshold,
            liveness_sweep_interval_ms: hub.liveness_sweep_interval.as_millis() as u64,
            liveness_timeout_ms: hub.liveness_timeout.as_millis() as u64,
            score_smoothing: hub.score_smoothing,
            anomaly_base_penalty: hub.anomaly_base_penalty,
            anomaly_ttl_ms: hub.anomaly_ttl.as_millis() as u64,
            seal_quorum_fraction: hub.seal_quorum_fraction,
            key_directory_file: PathBuf::from("./data/hub/keys.json"),
            state_file: PathBuf::from("./data/hub/state.json"),
            persist_interval_ms: 5_000,
            governance_token: String::new(),
            max_heartbeats_per_sec: 100,
            event_buffer: 1024,
        }
    }
}

impl SentinelConfig {
    /// Defaults, then `SN_CONFIG`, then `SN_*` overrides. Not yet validated.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `SN_<FIELD>` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvOverrides { lookup: &lookup };

        let node = &mut self.node;
        env.string("SN_NODE_ID", &mut node.node_id);
        env.string("SN_HUB_ONION_ADDRESS", &mut node.hub_onion_address);
        env.string("SN_ENTROPY_SOURCE", &mut node.entropy_source);
        env.path("SN_ENTROPY_DEVICE", &mut node.entropy_device);
        env.parse("SN_SAMPLE_SIZE", &mut node.sample_size)?;
        env.parse("SN_CAPTURE_TIMEOUT_MS", &mut node.capture_timeout_ms)?;
        env.parse("SN_HEARTBEAT_INTERVAL_MS", &mut node.heartbeat_interval_ms)?;
        env.parse(
            "SN_DEGRADED_INTERVAL_MULTIPLIER",
            &mut node.degraded_interval_multiplier,
        )?;
        env.parse("SN_READINESS_POLL_MS", &mut node.readiness_poll_ms)?;
        env.path("SN_SEQUENCE_FILE", &mut node.sequence_file);
        if let Some(path) = env.get("SN_SIGNING_KEY_FILE") {
            node.signing_key_file = Some(PathBuf::from(path));
        }
        env.string("SN_SOCKS_PROXY", &mut node.socks_proxy);

        let retry = &mut self.retry;
        env.parse("SN_RETRY_BASE_DELAY_MS", &mut retry.retry_base_delay_ms)?;
        env.parse("SN_RETRY_MAX_DELAY_MS", &mut retry.retry_max_delay_ms)?;
        env.parse("SN_RETRY_MAX_ATTEMPTS", &mut retry.retry_max_attempts)?;
        env.parse("SN_ATTEMPT_TIMEOUT_MS", &mut retry.attempt_timeout_ms)?;
        env.parse("SN_OVERLOAD_MULTIPLIER", &mut retry.overload_multiplier)?;

        let hub = &mut self.hub;
        env.string("SN_LISTEN_ADDR", &mut hub.listen_addr);
        env.parse("SN_FRESHNESS_WINDOW_MS", &mut hub.freshness_window_ms)?;
        env.parse("SN_PHI_WARNING_THRESHOLD", &mut hub.phi_warning_threshold)?;
        env.parse(
            "SN_LIVENESS_SWEEP_INTERVAL_MS",
            &mut hub.liveness_sweep_interval_ms,
        )?;
        env.parse("SN_LIVENESS_TIMEOUT_MS", &mut hub.liveness_timeout_ms)?;
        env.parse("SN_SCORE_SMOOTHING", &mut hub.score_smoothing)?;
        env.parse("SN_ANOMALY_BASE_PENALTY", &mut hub.anomaly_base_penalty)?;
        env.parse("SN_ANOMALY_TTL_MS", &mut hub.anomaly_ttl_ms)?;
        env.parse("SN_SEAL_QUORUM_FRACTION", &mut hub.seal_quorum_fraction)?;
        env.path("SN_KEY_DIRECTORY_FILE", &mut hub.key_directory_file);
        env.path("SN_STATE_FILE", &mut hub.state_file);
        env.parse("SN_PERSIST_INTERVAL_MS", &mut hub.persist_interval_ms)?;
        env.string("SN_GOVERNANCE_TOKEN", &mut hub.governance_token);
        env.parse("SN_MAX_HEARTBEATS_PER_SEC", &mut hub.max_heartbeats_per_sec)?;
        env.parse("SN_EVENT_BUFFER", &mut hub.event_buffer)?;
        Ok(())
    }

    /// Checks needed before starting `sentinel-node`.
    pub fn validate_for_node(&self) -> Result<(), ConfigError> {
        let node = &self.node;
        ensure(!node.node_id.trim().is_empty(), "node.node_id is required")?;
        ensure(
            !node.hub_onion_address.trim().is_empty(),
            "node.hub_onion_address is required",
        )?;
        ensure(
            node.sample_size > 0 && node.sample_size <= MAX_SAMPLE_SIZE,
            "node.sample_size must be between 1 and 1048576",
        )?;
        ensure(
            node.heartbeat_interval_ms > 0,
            "node.heartbeat_interval_ms must be positive",
        )?;
        ensure(
            node.degraded_interval_multiplier >= 1,
            "node.degraded_interval_multiplier must be at least 1",
        )?;

        let retry = &self.retry;
        ensure(
            retry.retry_base_delay_ms > 0,
            "retry.retry_base_delay_ms must be positive",
        )?;
        ensure(
            retry.retry_base_delay_ms <= retry.retry_max_delay_ms,
            "retry.retry_base_delay_ms must not exceed retry.retry_max_delay_ms",
        )?;
        ensure(
            retry.retry_max_attempts >= 1,
            "retry.retry_max_attempts must be at least 1",
        )?;
        ensure(
            retry.attempt_timeout_ms > 0,
            "retry.attempt_timeout_ms must be positive",
        )
    }

    /// Checks needed before starting `sentinel-hub`.
    pub fn validate_for_hub(&self) -> Result<(), ConfigError> {
        let hub = &self.hub;
        self.listen_addr()?;
        ensure(
            hub.phi_warning_threshold > 0.0 && hub.phi_warning_threshold <= 1.0,
            "hub.phi_warning_threshold must be in (0, 1]",
        )?;
        ensure(
            hub.score_smoothing > 0.0 && hub.score_smoothing <= 1.0,
            "hub.score_smoothing must be in (0, 1]",
        )?;
        ensure(
            (0.0..=1.0).contains(&hub.anomaly_base_penalty),
            "hub.anomaly_base_penalty must be in [0, 1]",
        )?;
        ensure(
            hub.seal_quorum_fraction > 0.0 && hub.seal_quorum_fraction <= 1.0,
            "hub.seal_quorum_fraction must be in (0, 1]",
        )?;
        ensure(
            hub.freshness_window_ms > 0 && hub.liveness_timeout_ms > 0,
            "hub freshness and liveness windows must be positive",
        )?;
        ensure(
            hub.liveness_sweep_interval_ms > 0 && hub.persist_interval_ms > 0,
            "hub sweep and persist intervals must be positive",
        )?;
        ensure(
            hub.max_heartbeats_per_sec > 0,
            "hub.max_heartbeats_per_sec must be positive",
        )?;
        ensure(hub.event_buffer > 0, "hub.event_buffer must be positive")
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.hub.listen_addr.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "hub.listen_addr {:?} is not a socket address",
                self.hub.listen_addr
            ))
        })
    }

    pub fn agent_config(&self) -> AgentConfig {
        let node = &self.node;
        AgentConfig {
            node_id: NodeId::new(node.node_id.trim()),
            hub_onion_address: node.hub_onion_address.trim().to_string(),
            heartbeat_path: HEARTBEAT_PATH.to_string(),
            entropy_source: node.entropy_source.clone(),
            heartbeat_interval: Duration::from_millis(node.heartbeat_interval_ms),
            degraded_interval_multiplier: node.degraded_interval_multiplier,
            readiness_poll: Duration::from_millis(node.readiness_poll_ms),
            capture_retry_base: Duration::from_millis(node.heartbeat_interval_ms / 30)
                .max(Duration::from_millis(100)),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.retry;
        RetryPolicy {
            base_delay: Duration::from_millis(retry.retry_base_delay_ms),
            max_delay: Duration::from_millis(retry.retry_max_delay_ms),
            max_attempts: retry.retry_max_attempts,
            attempt_timeout: Duration::from_millis(retry.attempt_timeout_ms),
            overload_multiplier: retry.overload_multiplier,
        }
    }

    pub fn channel_config(&self) -> TorChannelConfig {
        let proxy = self.node.socks_proxy.trim();
        TorChannelConfig {
            socks_proxy: (!proxy.is_empty()).then(|| proxy.to_string()),
            request_timeout: Duration::from_millis(self.retry.attempt_timeout_ms),
            ..TorChannelConfig::default()
        }
    }

    pub fn hub_config(&self) -> HubConfig {
        let hub = &self.hub;
        HubConfig {
            freshness_window: Duration::from_millis(hub.freshness_window_ms),
            phi_warning_threshold: hub.phi_warning_threshold,
            liveness_sweep_interval: Duration::from_millis(hub.liveness_sweep_interval_ms),
            liveness_timeout: Duration::from_millis(hub.liveness_timeout_ms),
            score_smoothing: hub.score_smoothing,
            anomaly_base_penalty: hub.anomaly_base_penalty,
            anomaly_ttl: Duration::from_millis(hub.anomaly_ttl_ms),
            seal_quorum_fraction: hub.seal_quorum_fraction,
        }
    }
}

fn ensure(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Invalid(message.to_string()))
    }
}

struct EnvOverrides<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl EnvOverrides<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn string(&self, key: &str, target: &mut String) {
        if let Some(value) = (self.lookup)(key) {
            *target = value.trim().to_string();
        }
    }

    fn path(&self, key: &str, target: &mut PathBuf) {
        if let Some(value) = self.get(key) {
            *target = PathBuf::from(value.trim());
        }
    }

    fn parse<T: FromStr>(&self, key: &'static str, target: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = self.get(key) {
            *target = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key, value })?;
        }
        Ok(())
    }
}
