//! # Metrics Bridge
//!
//! Subsystem crates know nothing about Prometheus. These adapters translate
//! what they already expose (bus events, attempt observers, status watches)
//! into the `sentinel-telemetry` collectors.

use sentinel_telemetry::{
    BACKOFF_DELAY, CAPTURE_FAILURES, CONTINGENCY_LEVEL, DELIVERY_ATTEMPTS, FLEET_PHI,
    HEARTBEATS_ACCEPTED, HEARTBEATS_REJECTED, INTEGRATION_EVENTS, NODES_LIVE, NODES_STALE,
    PROOFS_PRODUCED,
};
use shared_bus::{FleetEvent, Subscription};
use shared_types::RecomputeCause;
use sn_02_heartbeat_transport::{AttemptEvent, AttemptObserver};
use sn_03_node_agent::AgentStatus;
use sn_04_hub_aggregator::FleetSnapshot;
use tokio::sync::watch;
use tracing::debug;

/// Update hub collectors from one bus event.
pub fn record_fleet_event(event: &FleetEvent) {
    match event {
        FleetEvent::Integration(event) => {
            if event.cause == RecomputeCause::Heartbeat {
                HEARTBEATS_ACCEPTED.inc();
            }
            INTEGRATION_EVENTS
                .with_label_values(&[event.cause.as_str()])
                .inc();
            FLEET_PHI.set(event.new_phi_score);
            CONTINGENCY_LEVEL.set(f64::from(event.contingency.level()));
        }
        FleetEvent::HeartbeatRejected { reason, .. } => {
            HEARTBEATS_REJECTED.with_label_values(&[reason.as_str()]).inc();
        }
        FleetEvent::ContingencyChanged { to, .. } => {
            CONTINGENCY_LEVEL.set(f64::from(to.level()));
        }
        FleetEvent::NodeMarkedStale { .. } => {}
    }
}

/// Refresh the node population gauges.
pub fn record_snapshot(snapshot: &FleetSnapshot) {
    FLEET_PHI.set(snapshot.phi_score);
    CONTINGENCY_LEVEL.set(f64::from(snapshot.contingency.level()));
    NODES_LIVE.set(snapshot.live_nodes as f64);
    NODES_STALE.set(snapshot.stale_nodes as f64);
}

/// Count rate-limiter refusals reported as a running total.
#[derive(Debug, Default)]
pub struct OverloadTally {
    seen: u64,
}

impl OverloadTally {
    pub fn record(&mut self, total: u64) {
        let delta = total.saturating_sub(self.seen);
        if delta > 0 {
            HEARTBEATS_REJECTED
                .with_label_values(&["overload"])
                .inc_by(delta as f64);
        }
        self.seen = self.seen.max(total);
    }
}

/// Forward bus events into the collectors until the bus closes or
/// `shutdown` flips to true.
pub async fn run_hub_metrics(mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => record_fleet_event(&event),
                None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!(dropped = subscription.dropped(), "Hub metrics bridge stopped");
}

/// [`AttemptObserver`] feeding the transport collectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportMetricsObserver;

impl AttemptObserver for TransportMetricsObserver {
    fn on_attempt(&self, event: &AttemptEvent) {
        DELIVERY_ATTEMPTS
            .with_label_values(&[event.outcome.as_str()])
            .inc();
        if let Some(delay) = event.next_delay {
            BACKOFF_DELAY.observe(delay.as_secs_f64());
        }
    }
}

/// Mirror the agent's cumulative counters into the node collectors.
pub async fn run_agent_metrics(
    mut status: watch::Receiver<AgentStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut last = AgentStatus::default();
    loop {
        {
            let current = status.borrow_and_update();
            let proofs = current.proofs_produced.saturating_sub(last.proofs_produced);
            let captures = current.capture_failures.saturating_sub(last.capture_failures);
            if proofs > 0 {
                PROOFS_PRODUCED.inc_by(proofs as f64);
            }
            if captures > 0 {
                CAPTURE_FAILURES.inc_by(captures as f64);
            }
            last = current.clone();
        }

        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
