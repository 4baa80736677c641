//! # Sensor Node Runtime
//!
//! Builds one [`NodeAgent`] from configuration and runs it with a metrics
//! bridge until shutdown.

use crate::adapters::{load_signing_key, DeviceNoiseSource, NODE_KEY_SEED_ENV};
use crate::container::SentinelConfig;
use crate::wiring::{run_agent_metrics, TransportMetricsObserver};
use anyhow::{Context, Result};
use shared_crypto::Ed25519KeyPair;
use shared_types::SystemTimeSource;
use sn_01_proof_pipeline::{Ed25519Signer, ProofPipeline, Sha256Digester};
use sn_02_heartbeat_transport::{HeartbeatTransport, TorHttpChannel};
use sn_03_node_agent::{AgentStatus, FileSequenceStore, NodeAgent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub type SentinelAgent = NodeAgent<
    ProofPipeline<Sha256Digester, Ed25519Signer>,
    HeartbeatTransport<TorHttpChannel>,
    DeviceNoiseSource,
    FileSequenceStore,
>;

pub struct NodeRuntime {
    agent: Arc<SentinelAgent>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeRuntime {
    /// Validate `config`, load the signing key and build the agent.
    pub fn from_config(config: &SentinelConfig) -> Result<Self> {
        config.validate_for_node()?;
        let key = load_signing_key(
            std::env::var(NODE_KEY_SEED_ENV).ok(),
            config.node.signing_key_file.as_deref(),
        )?;
        Self::with_key(config, key)
    }

    /// Build the agent around an already loaded key.
    pub fn with_key(config: &SentinelConfig, key: Ed25519KeyPair) -> Result<Self> {
        let agent_config = config.agent_config();
        info!(
            node_id = %agent_config.node_id,
            public_key = %key.public_key().to_hex(),
            "Node identity loaded"
        );

        let pipeline = ProofPipeline::new(Sha256Digester, Ed25519Signer::new(key));
        let channel = TorHttpChannel::new(config.channel_config())
            .context("failed to build the anonymous channel")?;
        let transport = HeartbeatTransport::new(channel, config.retry_policy())
            .with_observer(Arc::new(TransportMetricsObserver));
        let source = DeviceNoiseSource::new(
            &config.node.entropy_device,
            config.node.sample_size,
            Duration::from_millis(config.node.capture_timeout_ms),
            Arc::new(SystemTimeSource),
        );
        let sequences = FileSequenceStore::open(&config.node.sequence_file).with_context(|| {
            format!(
                "failed to open sequence file {}",
                config.node.sequence_file.display()
            )
        })?;

        let agent = NodeAgent::new(agent_config, pipeline, transport, source, sequences);
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            agent: Arc::new(agent),
            shutdown_tx,
            tasks: Vec::new(),
        })
    }

    /// Spawn the agent loop and its metrics bridge.
    pub fn start(&mut self) {
        let agent = Arc::clone(&self.agent);
        let shutdown = self.shutdown_tx.subscribe();
        self.tasks.push(tokio::spawn(async move {
            agent.run(shutdown).await;
        }));
        self.tasks.push(tokio::spawn(run_agent_metrics(
            self.agent.status(),
            self.shutdown_tx.subscribe(),
        )));
    }

    #[must_use]
    pub fn status(&self) -> watch::Receiver<AgentStatus> {
        self.agent.status()
    }

    #[must_use]
    pub fn agent(&self) -> Arc<SentinelAgent> {
        Arc::clone(&self.agent)
    }

    /// Stop the loop; an in-flight delivery is cancelled.
    pub async fn shutdown(self) {
        info!("Node runtime shutting down");
        if self.shutdown_tx.send(true).is_err() {
            // Nothing is running yet.
            return;
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Node task ended abnormally");
            }
        }
    }
}
