//! # Hub Aggregator Service
//!
//! Admission, scoring and the contingency latch.
//!
//! Locking: a heartbeat, anomaly report or sweep step for a node first takes
//! that node's lock, then the ledger lock. Different nodes are validated in
//! parallel; Φ and the latch only change under the ledger lock, so every
//! recomputation sees a consistent copy of all node states.
//!
//! Persistence: snapshots are staged under the ledger lock, so they queue in
//! revision order, and written to the store after it is released. One caller
//! writes at a time; a caller that finds the writer busy leaves its snapshot
//! for that writer to pick up. Only the newest staged snapshot is kept.

use crate::domain::anomaly::{AnomalyClass, AnomalyFlag};
use crate::domain::config::HubConfig;
use crate::domain::contingency::{ContingencyLatch, Transition};
use crate::domain::entities::{FleetSnapshot, NodeLedger, NodeState};
use crate::domain::errors::{AcceptError, AuthFailure, GovernanceError, ReplayKind, StoreError};
use crate::domain::phi::{FreshnessWeightedPolicy, PhiPolicy};
use crate::ports::inbound::HubApi;
use crate::ports::outbound::{HubStore, IntegrationSink, KeyDirectory};
use dashmap::DashMap;
use parking_lot::Mutex;
use shared_bus::FleetEvent;
use shared_types::{
    ContingencyState, Heartbeat, HeartbeatWire, HubAck, IntegrationEvent, NodeId, Proof,
    RecomputeCause, TimeSource, UnixMillis,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct Ledger {
    nodes: NodeLedger,
    phi: f64,
    latch: ContingencyLatch,
    revision: u64,
    /// Hub time at which a saved ledger was restored.
    resumed_at: Option<UnixMillis>,
}

#[derive(Default)]
struct StagedWrites {
    pending: Mutex<Option<FleetSnapshot>>,
    /// Revision last handed to the store; held by whoever is writing.
    writer: Mutex<u64>,
}

#[derive(Default)]
struct HubCounters {
    accepted: AtomicU64,
    rejected_auth: AtomicU64,
    rejected_replay: AtomicU64,
    rejected_stale: AtomicU64,
    rejected_malformed: AtomicU64,
    recomputations: AtomicU64,
    sweeps: AtomicU64,
}

/// Hub statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    pub heartbeats_accepted: u64,
    pub rejected_auth: u64,
    pub rejected_replay: u64,
    pub rejected_stale: u64,
    pub rejected_malformed: u64,
    pub recomputations: u64,
    pub sweeps: u64,
    pub known_nodes: usize,
}

pub struct HubAggregator<K, I, H>
where
    K: KeyDirectory,
    I: IntegrationSink,
    H: HubStore,
{
    config: HubConfig,
    keys: K,
    sink: I,
    store: H,
    policy: Box<dyn PhiPolicy>,
    time: Arc<dyn TimeSource>,
    node_locks: DashMap<NodeId, Arc<Mutex<()>>>,
    ledger: Mutex<Ledger>,
    staged: StagedWrites,
    counters: HubCounters,
}

impl<K, I, H> HubAggregator<K, I, H>
where
    K: KeyDirectory,
    I: IntegrationSink,
    H: HubStore,
{
    /// Create a hub with the default Φ policy, resuming from `store`.
    pub fn new(
        config: HubConfig,
        keys: K,
        sink: I,
        store: H,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, StoreError> {
        Self::with_policy(
            config,
            keys,
            sink,
            store,
            time,
            Box::new(FreshnessWeightedPolicy),
        )
    }

    pub fn with_policy(
        config: HubConfig,
        keys: K,
        sink: I,
        store: H,
        time: Arc<dyn TimeSource>,
        policy: Box<dyn PhiPolicy>,
    ) -> Result<Self, StoreError> {
        let mut ledger = Ledger::default();
        if let Some(saved) = store.load()? {
            ledger.nodes = saved
                .nodes
                .into_iter()
                .map(|node| (node.node_id.clone(), node))
                .collect();
            ledger.latch = ContingencyLatch::restore(saved.contingency, saved.contingency_reason);
            ledger.revision = saved.revision;
            ledger.resumed_at = Some(time.now());
            info!(
                nodes = ledger.nodes.len(),
                contingency = %ledger.latch.state(),
                revision = ledger.revision,
                saved_at = saved.taken_at.as_millis(),
                "Restored hub state"
            );
        }
        ledger.phi = policy.compute(&ledger.nodes);

        Ok(Self {
            config,
            keys,
            sink,
            store,
            policy,
            time,
            node_locks: DashMap::new(),
            ledger: Mutex::new(ledger),
            staged: StagedWrites::default(),
            counters: HubCounters::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    #[must_use]
    pub fn contingency(&self) -> ContingencyState {
        self.ledger.lock().latch.state()
    }

    #[must_use]
    pub fn phi_score(&self) -> f64 {
        self.ledger.lock().phi
    }

    pub fn get_stats(&self) -> HubStats {
        HubStats {
            heartbeats_accepted: self.counters.accepted.load(Ordering::Relaxed),
            rejected_auth: self.counters.rejected_auth.load(Ordering::Relaxed),
            rejected_replay: self.counters.rejected_replay.load(Ordering::Relaxed),
            rejected_stale: self.counters.rejected_stale.load(Ordering::Relaxed),
            rejected_malformed: self.counters.rejected_malformed.load(Ordering::Relaxed),
            recomputations: self.counters.recomputations.load(Ordering::Relaxed),
            sweeps: self.counters.sweeps.load(Ordering::Relaxed),
            known_nodes: self.ledger.lock().nodes.len(),
        }
    }

    fn node_lock(&self, node_id: &NodeId) -> Arc<Mutex<()>> {
        if let Some(lock) = self.node_locks.get(node_id) {
            return Arc::clone(&lock);
        }
        Arc::clone(&self.node_locks.entry(node_id.clone()).or_default())
    }

    fn authenticate(&self, proof: &Proof) -> Result<(), AcceptError> {
        let node_id = proof.node_id();
        let auth_error = |reason| AcceptError::Auth {
            node_id: node_id.clone(),
            reason,
        };
        let key = self
            .keys
            .public_key(node_id)
            .ok_or_else(|| auth_error(AuthFailure::UnknownNode))?;
        key.verify(&proof.message(), proof.signature().as_bytes())
            .map_err(|_| auth_error(AuthFailure::BadSignature))
    }

    fn admit(&self, heartbeat: &Heartbeat) -> Result<HubAck, AcceptError> {
        let proof = &heartbeat.proof;
        let node_id = proof.node_id();
        let sequence = proof.sequence();

        self.authenticate(proof)?;

        let lock = self.node_lock(node_id);
        let _serialized = lock.lock();
        let now = self.time.now();

        let (previous, resumed_at) = {
            let ledger = self.ledger.lock();
            (ledger.nodes.get(node_id).cloned(), ledger.resumed_at)
        };
        if let Some(prev) = &previous {
            if sequence <= prev.last_sequence {
                return Err(AcceptError::Replay {
                    node_id: node_id.clone(),
                    sequence,
                    kind: ReplayKind::Sequence {
                        last_sequence: prev.last_sequence,
                    },
                });
            }
            if prev.last_digest.as_ref() == Some(proof.entropy_digest()) {
                return Err(AcceptError::Replay {
                    node_id: node_id.clone(),
                    sequence,
                    kind: ReplayKind::RepeatedEntropy,
                });
            }
        }

        // Acceptances after the last flush were lost with the old process.
        // Until the node is heard from again, nothing captured before the
        // restore is admitted.
        if let Some(resumed_at) = resumed_at {
            let heard_since = previous
                .as_ref()
                .is_some_and(|prev| prev.last_seen_at >= resumed_at);
            if !heard_since && proof.captured_at() < resumed_at {
                return Err(AcceptError::Replay {
                    node_id: node_id.clone(),
                    sequence,
                    kind: ReplayKind::BeforeRestore { resumed_at },
                });
            }
        }

        let captured_at = proof.captured_at();
        let window = self.config.freshness_millis();
        if now.millis_since(captured_at) > window || captured_at.millis_since(now) > window {
            return Err(AcceptError::Stale {
                node_id: node_id.clone(),
                captured_at,
                now,
            });
        }

        let base = previous.unwrap_or_else(|| NodeState::new(node_id.clone(), now));
        if base.stale {
            info!(node_id = %node_id, sequence, "Stale node is live again");
        }
        let updated = base.accepted(
            sequence,
            *proof.entropy_digest(),
            now,
            self.config.score_smoothing,
        );

        let mut ledger = self.ledger.lock();
        ledger.nodes.insert(node_id.clone(), updated);
        let event = self.recompute(
            &mut ledger,
            RecomputeCause::Heartbeat,
            Some(node_id.clone()),
            None,
            now,
        );
        Ok(HubAck {
            phi_score: event.new_phi_score,
            contingency: event.contingency,
        })
    }

    fn count_rejection(&self, error: &AcceptError) {
        let counter = match error {
            AcceptError::Auth { .. } => &self.counters.rejected_auth,
            AcceptError::Replay { .. } => &self.counters.rejected_replay,
            AcceptError::Stale { .. } => &self.counters.rejected_stale,
            AcceptError::Malformed(_) => &self.counters.rejected_malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Recompute Φ and apply the score rule. Must be called with the ledger
    /// lock held; emits exactly one integration event.
    fn recompute(
        &self,
        ledger: &mut Ledger,
        cause: RecomputeCause,
        node_id: Option<NodeId>,
        forced: Option<Transition>,
        now: UnixMillis,
    ) -> IntegrationEvent {
        ledger.phi = self.policy.compute(&ledger.nodes);
        ledger.revision += 1;

        let transition = forced.or_else(|| {
            if cause == RecomputeCause::Governance {
                return None;
            }
            ledger
                .latch
                .observe_phi(ledger.phi, self.config.phi_warning_threshold, now)
        });
        if let Some(transition) = transition {
            self.announce(ledger, transition, cause, now);
        }

        self.counters.recomputations.fetch_add(1, Ordering::Relaxed);
        let contingency = ledger.latch.state();
        let event = IntegrationEvent {
            new_phi_score: ledger.phi,
            contingency_activated: contingency == ContingencyState::Sealed,
            node_id,
            contingency,
            cause,
            emitted_at: now,
        };
        debug!(
            phi = event.new_phi_score,
            contingency = %contingency,
            cause = ?cause,
            "Fleet integrity recomputed"
        );
        self.sink.emit(FleetEvent::Integration(event.clone()));
        event
    }

    /// Publish a level change and stage it for the store. The caller writes it
    /// once the ledger lock is released.
    fn announce(
        &self,
        ledger: &Ledger,
        transition: Transition,
        cause: RecomputeCause,
        now: UnixMillis,
    ) {
        warn!(
            from = %transition.from,
            to = %transition.to,
            phi = ledger.phi,
            reason = ledger.latch.reason().unwrap_or_default(),
            "Contingency level changed"
        );
        self.sink.emit(FleetEvent::ContingencyChanged {
            from: transition.from,
            to: transition.to,
            cause,
        });
        self.stage(Self::snapshot_of(ledger, now));
    }

    /// Must be called with the ledger lock held.
    fn stage(&self, snapshot: FleetSnapshot) {
        let mut pending = self.staged.pending.lock();
        if pending
            .as_ref()
            .map_or(true, |queued| queued.revision <= snapshot.revision)
        {
            *pending = Some(snapshot);
        }
    }

    /// Write whatever is staged. Must be called without the ledger lock.
    fn write_staged(&self) -> Result<(), StoreError> {
        let mut result = Ok(());
        loop {
            let Some(mut written) = self.staged.writer.try_lock() else {
                // The current writer drains the queue before it lets go.
                return result;
            };
            loop {
                let next = self.staged.pending.lock().take();
                let Some(snapshot) = next else {
                    break;
                };
                if snapshot.revision < *written {
                    continue;
                }
                match self.store.save(&snapshot) {
                    Ok(()) => *written = snapshot.revision,
                    Err(e) => result = Err(e),
                }
            }
            drop(written);

            let staged_meanwhile = self.staged.pending.lock().is_some();
            if !staged_meanwhile {
                return result;
            }
        }
    }

    fn flush_staged(&self) {
        if let Err(e) = self.write_staged() {
            error!(error = %e, "Failed to persist contingency change");
        }
    }

    fn snapshot_of(ledger: &Ledger, now: UnixMillis) -> FleetSnapshot {
        FleetSnapshot::new(
            &ledger.nodes,
            ledger.phi,
            ledger.latch.state(),
            ledger.latch.reason().map(str::to_string),
            now,
            ledger.revision,
        )
    }

    fn governance_reason(reason: &str) -> Result<&str, GovernanceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(GovernanceError::EmptyReason);
        }
        Ok(reason)
    }

    /// Apply an anomaly report. Must be called with the node and ledger locks held.
    fn flag_anomaly(
        &self,
        ledger: &mut Ledger,
        node_id: &NodeId,
        density: f64,
        now: UnixMillis,
    ) -> Result<IntegrationEvent, GovernanceError> {
        let flag = AnomalyFlag::new(
            density,
            self.config.anomaly_base_penalty,
            now,
            self.config.anomaly_ttl.as_millis() as u64,
        );
        let state = ledger
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| GovernanceError::UnknownNode(node_id.clone()))?;
        state.rolling_score = (state.rolling_score - flag.penalty).max(0.0);
        warn!(
            node_id = %node_id,
            density,
            class = flag.class.as_str(),
            penalty = flag.penalty,
            "Anomaly reported"
        );
        state.anomaly = Some(flag);

        let forced = self
            .pure_injection_quorum(ledger, now)
            .and_then(|(flagged, known)| {
                ledger.latch.seal(
                    format!("anomaly quorum: {flagged}/{known} nodes flagged pure injection"),
                    now,
                )
            });
        Ok(self.recompute(
            ledger,
            RecomputeCause::Anomaly,
            Some(node_id.clone()),
            forced,
            now,
        ))
    }


    fn pure_injection_quorum(&self, ledger: &Ledger, now: UnixMillis) -> Option<(usize, usize)> {
        let known = ledger.nodes.len();
        let flagged = ledger
            .nodes
            .values()
            .filter(|n| n.flagged_as(AnomalyClass::PureInjection, now))
            .count();
        let needed = self.config.seal_quorum_fraction * known as f64;
        (known > 0 && flagged > 0 && flagged as f64 >= needed).then_some((flagged, known))
    }
}

impl<K, I, H> HubApi for HubAggregator<K, I, H>
where
    K: KeyDirectory,
    I: IntegrationSink,
    H: HubStore,
{
    fn on_heartbeat(&self, heartbeat: Heartbeat) -> Result<HubAck, AcceptError> {
        let admitted = self.admit(&heartbeat);
        self.flush_staged();
        match admitted {
            Ok(ack) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                debug!(
                    node_id = %heartbeat.node_id(),
                    sequence = heartbeat.sequence(),
                    phi = ack.phi_score,
                    "Heartbeat accepted"
                );
                Ok(ack)
            }
            Err(e) => {
                self.count_rejection(&e);
                info!(
                    node_id = %heartbeat.node_id(),
                    sequence = heartbeat.sequence(),
                    reason = e.reason(),
                    error = %e,
                    "Heartbeat rejected"
                );
                self.sink.emit(FleetEvent::HeartbeatRejected {
                    node_id: heartbeat.node_id().clone(),
                    sequence: heartbeat.sequence(),
                    reason: e.reason().to_string(),
                });
                Err(e)
            }
        }
    }

    fn on_heartbeat_body(&self, body: &[u8]) -> Result<HubAck, AcceptError> {
        match HeartbeatWire::from_json(body).and_then(Heartbeat::try_from) {
            Ok(heartbeat) => self.on_heartbeat(heartbeat),
            Err(e) => {
                self.counters
                    .rejected_malformed
                    .fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "Malformed heartbeat body");
                Err(AcceptError::Malformed(e))
            }
        }
    }

    fn report_anomaly(
        &self,
        node_id: &NodeId,
        density: f64,
    ) -> Result<IntegrationEvent, GovernanceError> {
        if !(0.0..=1.0).contains(&density) {
            return Err(GovernanceError::InvalidDensity(density));
        }
        if self.keys.public_key(node_id).is_none() {
            return Err(GovernanceError::UnknownNode(node_id.clone()));
        }

        let lock = self.node_lock(node_id);
        let _serialized = lock.lock();
        let now = self.time.now();
        let event = {
            let mut ledger = self.ledger.lock();
            self.flag_anomaly(&mut ledger, node_id, density, now)?
        };
        self.flush_staged();
        Ok(event)
    }

    fn governance_seal(&self, reason: &str) -> Result<IntegrationEvent, GovernanceError> {
        let reason = Self::governance_reason(reason)?;
        let now = self.time.now();
        let event = {
            let mut ledger = self.ledger.lock();
            let forced = ledger.latch.seal(reason, now);
            info!(reason, changed = forced.is_some(), "Governance seal");
            self.recompute(&mut ledger, RecomputeCause::Governance, None, forced, now)
        };
        self.flush_staged();
        Ok(event)
    }

    fn governance_reset(&self, reason: &str) -> Result<IntegrationEvent, GovernanceError> {
        let reason = Self::governance_reason(reason)?;
        let now = self.time.now();
        let event = {
            let mut ledger = self.ledger.lock();
            let forced = ledger.latch.reset(reason, now);
            info!(reason, changed = forced.is_some(), "Governance reset");
            self.recompute(&mut ledger, RecomputeCause::Governance, None, forced, now)
        };
        self.flush_staged();
        Ok(event)
    }

    fn sweep_liveness(&self) -> IntegrationEvent {
        let now = self.time.now();
        let timeout = self.config.liveness_millis();
        let node_ids: Vec<NodeId> = self.ledger.lock().nodes.keys().cloned().collect();

        for node_id in node_ids {
            let lock = self.node_lock(&node_id);
            let _serialized = lock.lock();
            let mut ledger = self.ledger.lock();
            let Some(state) = ledger.nodes.get_mut(&node_id) else {
                continue;
            };

            if state.anomaly.as_ref().is_some_and(|flag| !flag.is_active(now)) {
                debug!(node_id = %node_id, "Anomaly flag expired");
                state.anomaly = None;
            }

            if state.is_silent(now, timeout) {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if !state.stale {
                    state.stale = true;
                    info!(
                        node_id = %node_id,
                        silent_ms = now.millis_since(state.last_seen_at),
                        "Node marked stale"
                    );
                    self.sink.emit(FleetEvent::NodeMarkedStale {
                        node_id: node_id.clone(),
                        consecutive_failures: state.consecutive_failures,
                    });
                }
            }
        }

        self.counters.sweeps.fetch_add(1, Ordering::Relaxed);
        let event = {
            let mut ledger = self.ledger.lock();
            self.recompute(&mut ledger, RecomputeCause::LivenessSweep, None, None, now)
        };
        self.flush_staged();
        event
    }

    fn snapshot(&self) -> FleetSnapshot {
        let now = self.time.now();
        Self::snapshot_of(&self.ledger.lock(), now)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let (nodes, revision) = {
            let ledger = self.ledger.lock();
            self.stage(Self::snapshot_of(&ledger, self.time.now()));
            (ledger.nodes.len(), ledger.revision)
        };
        self.write_staged()?;
        debug!(nodes, revision, "Hub state persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::key_directory::StaticKeyDirectory;
    use crate::test_utils::{FleetFixture, InMemoryHubStore, RecordingSink};
    use shared_types::{ControllableTimeSource, EntropyDigest, ProofSignature};
    use std::sync::{mpsc, Barrier};
    use std::time::Duration;

    const T0: u64 = 1_700_000_000_000;

    type TestHub = HubAggregator<StaticKeyDirectory, Arc<RecordingSink>, Arc<InMemoryHubStore>>;

    struct Harness {
        hub: TestHub,
        fleet: FleetFixture,
        sink: Arc<RecordingSink>,
        store: Arc<InMemoryHubStore>,
        clock: Arc<ControllableTimeSource>,
    }

    impl Harness {
        fn now(&self) -> UnixMillis {
            self.clock.now()
        }

        fn beat(&self, index: usize, sequence: u64) -> Result<HubAck, AcceptError> {
            self.hub
                .on_heartbeat(self.fleet.heartbeat(index, sequence, self.now()))
        }
    }

    fn harness_with(size: usize, config: HubConfig, store: Arc<InMemoryHubStore>) -> Harness {
        harness_at(size, config, store, T0)
    }

    fn harness_at(
        size: usize,
        config: HubConfig,
        store: Arc<InMemoryHubStore>,
        start: u64,
    ) -> Harness {
        let fleet = FleetFixture::new(size);
        let sink = Arc::new(RecordingSink::default());
        let clock = Arc::new(ControllableTimeSource::new(start));
        let hub = HubAggregator::new(
            config,
            fleet.directory(),
            Arc::clone(&sink),
            Arc::clone(&store),
            clock.clone(),
        )
        .unwrap();
        Harness {
            hub,
            fleet,
            sink,
            store,
            clock,
        }
    }

    fn harness(size: usize) -> Harness {
        harness_with(size, HubConfig::for_testing(), Arc::default())
    }

    #[test]
    fn test_first_heartbeat_creates_node_at_full_score() {
        let h = harness(3);
        let ack = h.beat(0, 1).unwrap();
        assert_eq!(ack.phi_score, 1.0);
        assert_eq!(ack.contingency, ContingencyState::Normal);

        let snapshot = h.hub.snapshot();
        assert_eq!(snapshot.known_nodes, 1);
        assert_eq!(snapshot.nodes[0].last_sequence, 1);
        assert_eq!(h.sink.integration_events().len(), 1);
    }

    #[test]
    fn test_replay_rejected_without_mutation() {
        let h = harness(2);
        h.beat(0, 5).unwrap();
        h.beat(1, 1).unwrap();
        let before = h.hub.snapshot();
        let events_before = h.sink.integration_events().len();

        h.clock.advance(1_000);
        for sequence in [5, 4] {
            let err = h.beat(0, sequence).unwrap_err();
            assert!(matches!(
                err,
                AcceptError::Replay {
                    kind: ReplayKind::Sequence { last_sequence: 5 },
                    ..
                }
            ));
        }

        let after = h.hub.snapshot();
        assert_eq!(after.nodes, before.nodes);
        assert_eq!(after.phi_score, before.phi_score);
        assert_eq!(h.sink.integration_events().len(), events_before);
        assert_eq!(h.hub.get_stats().rejected_replay, 2);
    }

    #[test]
    fn test_repeated_entropy_is_a_replay() {
        let h = harness(1);
        let digest = EntropyDigest([0x5A; 32]);
        h.hub
            .on_heartbeat(h.fleet.heartbeat_with_digest(0, 1, digest, h.now()))
            .unwrap();
        let err = h
            .hub
            .on_heartbeat(h.fleet.heartbeat_with_digest(0, 2, digest, h.now()))
            .unwrap_err();
        assert!(matches!(
            err,
            AcceptError::Replay {
                kind: ReplayKind::RepeatedEntropy,
                ..
            }
        ));
    }

    #[test]
    fn test_authentication_failures() {
        let h = harness(2);

        let stranger = FleetFixture::new(3).heartbeat(2, 1, h.now());
        assert!(matches!(
            h.hub.on_heartbeat(stranger),
            Err(AcceptError::Auth {
                reason: AuthFailure::UnknownNode,
                ..
            })
        ));

        let forged = h.fleet.forged(0, 1, h.now());
        assert!(matches!(
            h.hub.on_heartbeat(forged),
            Err(AcceptError::Auth {
                reason: AuthFailure::BadSignature,
                ..
            })
        ));

        // Moving captured_at invalidates the signature.
        let genuine = h.fleet.heartbeat(1, 1, UnixMillis::new(T0 - 500_000));
        let proof = &genuine.proof;
        let retimed = Proof::new(
            proof.node_id().clone(),
            proof.sequence(),
            *proof.entropy_digest(),
            ProofSignature(*proof.signature().as_bytes()),
            h.now(),
        );
        assert!(matches!(
            h.hub.on_heartbeat(Heartbeat::new(retimed, "CAMERA_NOISE")),
            Err(AcceptError::Auth {
                reason: AuthFailure::BadSignature,
                ..
            })
        ));

        assert_eq!(h.hub.snapshot().known_nodes, 0);
        assert_eq!(h.hub.get_stats().rejected_auth, 3);
    }

    #[test]
    fn test_freshness_window_applies_both_ways() {
        let h = harness(1);
        let window = h.hub.config().freshness_millis();

        let old = h.fleet.heartbeat(0, 1, UnixMillis::new(T0 - window - 1));
        assert!(matches!(
            h.hub.on_heartbeat(old),
            Err(AcceptError::Stale { .. })
        ));
        let future = h.fleet.heartbeat(0, 2, UnixMillis::new(T0 + window + 1));
        assert!(matches!(
            h.hub.on_heartbeat(future),
            Err(AcceptError::Stale { .. })
        ));
        let edge = h.fleet.heartbeat(0, 3, UnixMillis::new(T0 - window));
        assert!(h.hub.on_heartbeat(edge).is_ok());

        let rejected = h.sink.rejections();
        assert_eq!(rejected.len(), 2);
        assert!(rejected.iter().all(|(_, _, reason)| reason == "stale"));
    }

    #[test]
    fn test_malformed_body_is_counted() {
        let h = harness(1);
        let err = h.hub.on_heartbeat_body(b"{\"node_id\":").unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(h.hub.get_stats().rejected_malformed, 1);
    }

    #[test]
    fn test_fleet_of_ten_with_four_stale_drops_to_sixty_percent() {
        let h = harness(10);
        for index in 0..10 {
            h.beat(index, 1).unwrap();
        }
        assert_eq!(h.hub.phi_score(), 1.0);

        h.clock.advance(20_000);
        for index in 0..6 {
            h.beat(index, 2).unwrap();
        }
        h.clock.advance(15_000);
        let event = h.hub.sweep_liveness();

        assert!((event.new_phi_score - 0.60).abs() < 1e-9);
        assert!(event.node_id.is_none());
        let below: Vec<_> = h
            .sink
            .integration_events()
            .into_iter()
            .filter(|e| e.new_phi_score < 0.70)
            .collect();
        assert_eq!(below.len(), 1);
        assert_eq!(h.hub.contingency(), ContingencyState::Warning);

        let snapshot = h.hub.snapshot();
        assert_eq!(snapshot.stale_nodes, 4);
        assert_eq!(snapshot.live_nodes, 6);
        assert_eq!(h.sink.stale_nodes().len(), 4);
    }

    #[test]
    fn test_all_but_one_stale_strictly_lowers_phi() {
        let h = harness(4);
        for index in 0..4 {
            h.beat(index, 1).unwrap();
        }
        let before = h.hub.phi_score();

        h.clock.advance(20_000);
        h.beat(0, 2).unwrap();
        h.clock.advance(15_000);
        let after = h.hub.sweep_liveness().new_phi_score;
        assert!(after < before);
    }

    #[test]
    fn test_stale_node_revives_on_next_heartbeat() {
        let h = harness(2);
        h.beat(0, 1).unwrap();
        h.beat(1, 1).unwrap();
        h.clock.advance(31_000);
        h.hub.sweep_liveness();
        assert_eq!(h.hub.snapshot().stale_nodes, 2);

        h.beat(1, 2).unwrap();
        let snapshot = h.hub.snapshot();
        assert_eq!(snapshot.stale_nodes, 1);
        assert!((snapshot.phi_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sealed_never_auto_reverts() {
        let h = harness(3);
        for index in 0..3 {
            h.beat(index, 1).unwrap();
        }
        let sealed = h.hub.governance_seal("operator drill").unwrap();
        assert!(sealed.contingency_activated);

        for sequence in 2..5 {
            h.clock.advance(1_000);
            for index in 0..3 {
                let ack = h.beat(index, sequence).unwrap();
                assert_eq!(ack.contingency, ContingencyState::Sealed);
            }
            assert_eq!(h.hub.sweep_liveness().contingency, ContingencyState::Sealed);
        }
        assert_eq!(h.hub.phi_score(), 1.0);

        let reset = h.hub.governance_reset("drill over").unwrap();
        assert_eq!(reset.contingency, ContingencyState::Normal);
        assert!(!reset.contingency_activated);
        assert_eq!(reset.cause, RecomputeCause::Governance);
    }

    #[test]
    fn test_governance_requires_a_reason() {
        let h = harness(1);
        assert_eq!(
            h.hub.governance_seal("   ").unwrap_err(),
            GovernanceError::EmptyReason
        );
        assert_eq!(h.hub.contingency(), ContingencyState::Normal);
    }

    #[test]
    fn test_warning_holds_until_reset() {
        let h = harness(2);
        h.beat(0, 1).unwrap();
        h.beat(1, 1).unwrap();
        h.clock.advance(31_000);
        h.hub.sweep_liveness();
        assert_eq!(h.hub.contingency(), ContingencyState::Warning);

        h.beat(0, 2).unwrap();
        h.beat(1, 2).unwrap();
        assert_eq!(h.hub.phi_score(), 1.0);
        assert_eq!(h.hub.contingency(), ContingencyState::Warning);

        h.hub.governance_reset("fleet recovered").unwrap();
        assert_eq!(h.hub.contingency(), ContingencyState::Normal);
    }

    #[test]
    fn test_anomaly_quorum_seals() {
        let h = harness(4);
        for index in 0..4 {
            h.beat(index, 1).unwrap();
        }

        let first = h.hub.report_anomaly(&h.fleet.node_id(0), 0.97).unwrap();
        assert!(!first.contingency_activated);
        assert!(first.new_phi_score < 1.0);

        let probing = h.hub.report_anomaly(&h.fleet.node_id(1), 0.3).unwrap();
        assert!(!probing.contingency_activated);

        let second = h.hub.report_anomaly(&h.fleet.node_id(2), 0.95).unwrap();
        assert!(second.contingency_activated);
        assert_eq!(second.cause, RecomputeCause::Anomaly);
        assert!(h.sink.contingency_changes().contains(&(
            ContingencyState::Normal,
            ContingencyState::Sealed
        )));
        assert_eq!(
            h.store.last_saved().map(|s| s.contingency),
            Some(ContingencyState::Sealed)
        );
    }

    #[test]
    fn test_anomaly_report_validation() {
        let h = harness(2);
        assert_eq!(
            h.hub.report_anomaly(&h.fleet.node_id(0), 1.5).unwrap_err(),
            GovernanceError::InvalidDensity(1.5)
        );
        // Registered but never seen.
        assert!(matches!(
            h.hub.report_anomaly(&h.fleet.node_id(1), 0.5),
            Err(GovernanceError::UnknownNode(_))
        ));
        assert!(matches!(
            h.hub.report_anomaly(&NodeId::new("ghost"), 0.5),
            Err(GovernanceError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_sweep_expires_anomaly_flags() {
        let h = harness(1);
        h.beat(0, 1).unwrap();
        h.hub.report_anomaly(&h.fleet.node_id(0), 0.6).unwrap();
        assert!(h.hub.snapshot().nodes[0].anomaly.is_some());

        let ttl = h.hub.config().anomaly_ttl.as_millis() as u64;
        for sequence in 2..6 {
            h.clock.advance(ttl / 4);
            h.beat(0, sequence).unwrap();
        }
        h.hub.sweep_liveness();
        assert!(h.hub.snapshot().nodes[0].anomaly.is_none());
    }

    #[test]
    fn test_duplicate_concurrent_heartbeats_accept_once() {
        let h = harness(1);
        let heartbeat = h.fleet.heartbeat(0, 1, h.now());

        let accepted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let heartbeat = heartbeat.clone();
                    let hub = &h.hub;
                    scope.spawn(move || hub.on_heartbeat(heartbeat).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| usize::from(handle.join().unwrap()))
                .sum()
        });

        assert_eq!(accepted, 1);
        assert_eq!(h.hub.get_stats().rejected_replay, 7);
    }

    #[test]
    fn test_concurrent_sequences_accepted_in_order() {
        let h = harness(1);
        let heartbeats: Vec<_> = (1..=40)
            .rev()
            .map(|sequence| h.fleet.heartbeat(0, sequence, h.now()))
            .collect();

        std::thread::scope(|scope| {
            for chunk in heartbeats.chunks(10) {
                let hub = &h.hub;
                scope.spawn(move || {
                    for heartbeat in chunk {
                        let _ = hub.on_heartbeat(heartbeat.clone());
                    }
                });
            }
        });

        // Sequence 40 can only lose to itself, so it is always accepted.
        assert_eq!(h.hub.snapshot().nodes[0].last_sequence, 40);
        for (node_id, sequence, reason) in h.sink.rejections() {
            assert_eq!(node_id, h.fleet.node_id(0));
            assert_eq!(reason, "replay");
            assert!(sequence < 40);
        }
        let stats = h.hub.get_stats();
        assert_eq!(stats.heartbeats_accepted + stats.rejected_replay, 40);
    }

    #[test]
    fn test_sealed_survives_restart() {
        let store = Arc::new(InMemoryHubStore::default());
        {
            let h = harness_with(2, HubConfig::for_testing(), Arc::clone(&store));
            h.beat(0, 3).unwrap();
            h.hub.governance_seal("breach").unwrap();
            h.hub.persist().unwrap();
        }

        let h = harness_with(2, HubConfig::for_testing(), store);
        assert_eq!(h.hub.contingency(), ContingencyState::Sealed);
        assert_eq!(h.hub.snapshot().contingency_reason.as_deref(), Some("breach"));
        // The restored ledger still enforces sequence order.
        assert!(matches!(
            h.beat(0, 3),
            Err(AcceptError::Replay { .. })
        ));
    }

    #[test]
    fn test_restart_refuses_heartbeats_accepted_after_the_last_flush() {
        let store = Arc::new(InMemoryHubStore::default());
        let lost = {
            let h = harness_with(2, HubConfig::for_testing(), Arc::clone(&store));
            h.beat(0, 1).unwrap();
            h.hub.persist().unwrap();
            let lost = h.fleet.heartbeat(0, 2, h.now());
            h.hub.on_heartbeat(lost.clone()).unwrap();
            lost
        };

        // The process died before sequence 2 reached the store.
        let h = harness_at(2, HubConfig::for_testing(), store, T0 + 2_000);
        assert!(matches!(
            h.hub.on_heartbeat(lost.clone()),
            Err(AcceptError::Replay {
                kind: ReplayKind::BeforeRestore { .. },
                ..
            })
        ));
        // Nodes missing from the snapshot are held to the same rule.
        assert!(matches!(
            h.hub
                .on_heartbeat(h.fleet.heartbeat(1, 1, UnixMillis::new(T0 + 500))),
            Err(AcceptError::Replay { .. })
        ));
        assert_eq!(h.hub.snapshot().known_nodes, 1);

        // A fresh capture readmits the node and sequence order takes over.
        h.beat(0, 3).unwrap();
        assert!(matches!(
            h.hub.on_heartbeat(lost),
            Err(AcceptError::Replay {
                kind: ReplayKind::Sequence { last_sequence: 3 },
                ..
            })
        ));
        h.beat(1, 1).unwrap();
        assert_eq!(h.hub.get_stats().rejected_replay, 3);
    }

    /// Store whose first save parks between two barrier waits.
    struct GatedStore {
        inner: InMemoryHubStore,
        armed: std::sync::atomic::AtomicBool,
        gate: Barrier,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: InMemoryHubStore::default(),
                armed: std::sync::atomic::AtomicBool::new(true),
                gate: Barrier::new(2),
            }
        }
    }

    impl HubStore for GatedStore {
        fn load(&self) -> Result<Option<FleetSnapshot>, StoreError> {
            self.inner.load()
        }

        fn save(&self, snapshot: &FleetSnapshot) -> Result<(), StoreError> {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.gate.wait();
                self.gate.wait();
            }
            self.inner.save(snapshot)
        }
    }

    fn gated_hub(
        fleet: &FleetFixture,
        store: &Arc<GatedStore>,
    ) -> HubAggregator<StaticKeyDirectory, Arc<RecordingSink>, Arc<GatedStore>> {
        HubAggregator::new(
            HubConfig::for_testing(),
            fleet.directory(),
            Arc::new(RecordingSink::default()),
            Arc::clone(store),
            Arc::new(ControllableTimeSource::new(T0)),
        )
        .unwrap()
    }

    #[test]
    fn test_slow_periodic_flush_cannot_overwrite_a_seal() {
        let fleet = FleetFixture::new(2);
        let store = Arc::new(GatedStore::new());
        let hub = Arc::new(gated_hub(&fleet, &store));
        hub.on_heartbeat(fleet.heartbeat(0, 1, UnixMillis::new(T0)))
            .unwrap();

        let flusher = {
            let hub = Arc::clone(&hub);
            std::thread::spawn(move || hub.persist())
        };
        // The flush is inside the store with a NORMAL snapshot.
        store.gate.wait();
        let sealed = hub.governance_seal("breach").unwrap();
        assert!(sealed.contingency_activated);
        store.gate.wait();
        flusher.join().unwrap().unwrap();

        assert_eq!(
            store.inner.last_saved().map(|s| s.contingency),
            Some(ContingencyState::Sealed)
        );
        assert_eq!(store.inner.saves(), 2);
        let restarted = gated_hub(&fleet, &store);
        assert_eq!(restarted.contingency(), ContingencyState::Sealed);
    }

    #[test]
    fn test_admission_continues_while_a_contingency_change_is_written() {
        let fleet = FleetFixture::new(2);
        let store = Arc::new(GatedStore::new());
        let hub = Arc::new(gated_hub(&fleet, &store));
        hub.on_heartbeat(fleet.heartbeat(0, 1, UnixMillis::new(T0)))
            .unwrap();

        let sealer = {
            let hub = Arc::clone(&hub);
            std::thread::spawn(move || hub.governance_seal("drill"))
        };
        store.gate.wait();

        let (tx, rx) = mpsc::channel();
        {
            let hub = Arc::clone(&hub);
            let beat = fleet.heartbeat(1, 1, UnixMillis::new(T0));
            std::thread::spawn(move || {
                let _ = tx.send(hub.on_heartbeat(beat));
            });
        }
        let admitted = rx.recv_timeout(Duration::from_secs(5));
        store.gate.wait();
        sealer.join().unwrap().unwrap();

        let ack = admitted.expect("admission waited for the store").unwrap();
        assert_eq!(ack.contingency, ContingencyState::Sealed);
        assert_eq!(
            store.inner.last_saved().map(|s| s.contingency),
            Some(ContingencyState::Sealed)
        );
    }
}
