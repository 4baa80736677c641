//! # Node Agent Service
//!
//! Drives capture → pipeline → transport and keeps the local status.

use crate::domain::entities::{AgentConfig, AgentPhase, AgentStatus};
use crate::domain::errors::AgentError;
use crate::ports::outbound::{EntropySource, SequenceStore};
use shared_types::Heartbeat;
use sn_01_proof_pipeline::ProofProducer;
use sn_02_heartbeat_transport::{AttemptEvent, DeliveryReceipt, HeartbeatDelivery};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The per-node agent loop.
pub struct NodeAgent<P, T, E, S>
where
    P: ProofProducer,
    T: HeartbeatDelivery,
    E: EntropySource,
    S: SequenceStore,
{
    config: AgentConfig,
    pipeline: P,
    transport: T,
    source: E,
    sequences: S,
    status: watch::Sender<AgentStatus>,
}

impl<P, T, E, S> NodeAgent<P, T, E, S>
where
    P: ProofProducer,
    T: HeartbeatDelivery,
    E: EntropySource,
    S: SequenceStore,
{
    pub fn new(config: AgentConfig, pipeline: P, transport: T, source: E, sequences: S) -> Self {
        let last_sequence = sequences.last_used().ok().flatten();
        let (status, _) = watch::channel(AgentStatus {
            last_sequence,
            ..AgentStatus::default()
        });
        Self {
            config,
            pipeline,
            transport,
            source,
            sequences,
            status,
        }
    }

    /// Subscribe to status changes.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<AgentStatus> {
        self.status.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn set_phase(&self, phase: AgentPhase) {
        self.status.send_modify(|s| s.phase = phase);
    }

    /// Poll the channel until it reports ready. Returns false on shutdown.
    pub async fn wait_until_ready(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            if self.transport.is_channel_ready().await {
                self.status.send_modify(|s| s.channel_ready = true);
                info!(node_id = %self.config.node_id, "Anonymous channel ready");
                return true;
            }
            debug!(node_id = %self.config.node_id, "Channel not ready, polling");
            tokio::select! {
                _ = tokio::time::sleep(self.config.readiness_poll) => {}
                _ = shutdown_requested(shutdown) => return false,
            }
        }
    }

    /// One full capture → prove → send cycle.
    pub async fn run_once(&self) -> Result<DeliveryReceipt, AgentError> {
        let node_id = &self.config.node_id;

        self.set_phase(AgentPhase::Capturing);
        let sample = match self.source.next_sample().await {
            Ok(sample) => sample,
            Err(e) => {
                self.status.send_modify(|s| s.capture_failures += 1);
                return Err(e.into());
            }
        };

        self.set_phase(AgentPhase::Proving);
        let sequence = self.sequences.reserve_next()?;
        self.status.send_modify(|s| s.last_sequence = Some(sequence));
        let proof = self.pipeline.produce_proof(node_id, sequence, sample).await?;
        self.status.send_modify(|s| s.proofs_produced += 1);

        self.set_phase(AgentPhase::Sending);
        let heartbeat = Heartbeat::new(proof, self.config.entropy_source.clone());
        let observer = |event: &AttemptEvent| {
            if event.next_delay.is_some() {
                self.set_phase(AgentPhase::Backoff);
            }
        };
        let receipt = self
            .transport
            .deliver(
                &self.config.hub_onion_address,
                &self.config.heartbeat_path,
                heartbeat,
                &observer,
            )
            .await?;

        Ok(receipt)
    }

    /// Record the outcome of a cycle and return the delay before the next one.
    fn settle(
        &self,
        outcome: &Result<DeliveryReceipt, AgentError>,
        capture_streak: &mut u32,
    ) -> Duration {
        let node_id = &self.config.node_id;
        match outcome {
            Ok(receipt) => {
                *capture_streak = 0;
                self.status.send_modify(|s| {
                    if s.degraded {
                        info!(node_id = %node_id, "Recovered from degraded state");
                    }
                    s.phase = AgentPhase::Idle;
                    s.degraded = false;
                    s.degraded_reason = None;
                    s.consecutive_failures = 0;
                    s.heartbeats_delivered += 1;
                    s.last_ack = Some(receipt.ack);
                });
            }
            Err(AgentError::Capture(e)) => {
                *capture_streak = capture_streak.saturating_add(1);
                warn!(node_id = %node_id, error = %e, streak = *capture_streak, "Entropy capture failed");
                self.status.send_modify(|s| {
                    s.phase = if s.degraded {
                        AgentPhase::Degraded
                    } else {
                        AgentPhase::Idle
                    };
                });
            }
            Err(e) => {
                *capture_streak = 0;
                let degrades = e.degrades();
                warn!(node_id = %node_id, error = %e, degraded = degrades, "Heartbeat cycle failed");
                self.status.send_modify(|s| {
                    s.consecutive_failures = s.consecutive_failures.saturating_add(1);
                    if degrades {
                        s.degraded = true;
                        s.degraded_reason = Some(e.to_string());
                    }
                    s.phase = if s.degraded {
                        AgentPhase::Degraded
                    } else {
                        AgentPhase::Idle
                    };
                });
            }
        }

        let degraded = self.status.borrow().degraded;
        self.config.next_interval(degraded, *capture_streak)
    }

    /// Run until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            node_id = %self.config.node_id,
            hub = %self.config.hub_onion_address,
            interval_ms = self.config.heartbeat_interval.as_millis() as u64,
            "Node agent starting"
        );

        if !self.wait_until_ready(&mut shutdown).await {
            return;
        }

        let mut capture_streak = 0u32;
        loop {
            let outcome = tokio::select! {
                outcome = self.run_once() => outcome,
                _ = shutdown_requested(&mut shutdown) => break,
            };
            let delay = self.settle(&outcome, &mut capture_streak);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        self.set_phase(AgentPhase::Idle);
        info!(node_id = %self.config.node_id, "Node agent stopped");
    }
}

/// Resolves once shutdown is signalled or its sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
