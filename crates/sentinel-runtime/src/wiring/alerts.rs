//! # Reference Alert Consumer
//!
//! Watches integration events and raises alerts on edges:
//!
//! - Φ drops below the alert threshold → `WARNING` alert
//! - `contingency_activated` becomes true → `CRITICAL` alert, then the
//!   consumer's own sealing action
//!
//! The hub never suppresses repeated events, so the consumer keeps just
//! enough state to alert once per crossing.

use shared_bus::{FleetEvent, Subscription};
use shared_types::IntegrationEvent;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Φ below which a `WARNING` alert fires.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.70;

/// Alerts raised by [`AlertConsumer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    Warning { phi_score: f64 },
    Critical { phi_score: f64 },
    Recovered { phi_score: f64 },
}

/// Action taken by the consumer when the fleet seals.
pub trait SealAction: Send + Sync {
    fn seal(&self, event: &IntegrationEvent);
}

impl<F> SealAction for F
where
    F: Fn(&IntegrationEvent) + Send + Sync,
{
    fn seal(&self, event: &IntegrationEvent) {
        self(event)
    }
}

pub struct AlertConsumer {
    threshold: f64,
    below_threshold: bool,
    critical: bool,
    seal_action: Option<Arc<dyn SealAction>>,
}

impl Default for AlertConsumer {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_THRESHOLD)
    }
}

impl AlertConsumer {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            below_threshold: false,
            critical: false,
            seal_action: None,
        }
    }

    pub fn with_seal_action(mut self, action: Arc<dyn SealAction>) -> Self {
        self.seal_action = Some(action);
        self
    }

    /// Feed one event; returns the alert it raised, if any.
    pub fn observe(&mut self, event: &IntegrationEvent) -> Option<Alert> {
        let phi_score = event.new_phi_score;

        if event.contingency_activated {
            self.below_threshold = phi_score < self.threshold;
            if self.critical {
                return None;
            }
            self.critical = true;
            error!(
                phi = phi_score,
                cause = event.cause.as_str(),
                node_id = ?event.node_id,
                "CRITICAL: fleet sealed"
            );
            if let Some(action) = &self.seal_action {
                action.seal(event);
            }
            return Some(Alert::Critical { phi_score });
        }

        let was_critical = std::mem::replace(&mut self.critical, false);
        let below = phi_score < self.threshold;
        let was_below = std::mem::replace(&mut self.below_threshold, below);

        if below && !was_below {
            warn!(
                phi = phi_score,
                threshold = self.threshold,
                cause = event.cause.as_str(),
                node_id = ?event.node_id,
                "WARNING: fleet integrity below threshold"
            );
            Some(Alert::Warning { phi_score })
        } else if !below && (was_below || was_critical) {
            info!(phi = phi_score, "Fleet integrity recovered");
            Some(Alert::Recovered { phi_score })
        } else {
            None
        }
    }

    /// Consume the bus until it closes or `shutdown` flips to true.
    pub async fn run(mut self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                event = subscription.recv() => match event {
                    Some(FleetEvent::Integration(event)) => {
                        self.observe(&event);
                    }
                    Some(_) => {}
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(dropped = subscription.dropped(), "Alert consumer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ContingencyState, RecomputeCause, UnixMillis};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(phi: f64, contingency: ContingencyState) -> IntegrationEvent {
        IntegrationEvent {
            new_phi_score: phi,
            contingency_activated: contingency == ContingencyState::Sealed,
            node_id: None,
            contingency,
            cause: RecomputeCause::LivenessSweep,
            emitted_at: UnixMillis(0),
        }
    }

    #[test]
    fn test_warning_fires_once_per_crossing() {
        let mut consumer = AlertConsumer::default();
        assert_eq!(consumer.observe(&event(0.9, ContingencyState::Normal)), None);
        assert_eq!(
            consumer.observe(&event(0.6, ContingencyState::Warning)),
            Some(Alert::Warning { phi_score: 0.6 })
        );
        assert_eq!(consumer.observe(&event(0.5, ContingencyState::Warning)), None);
        assert_eq!(
            consumer.observe(&event(0.8, ContingencyState::Warning)),
            Some(Alert::Recovered { phi_score: 0.8 })
        );
        assert_eq!(
            consumer.observe(&event(0.65, ContingencyState::Warning)),
            Some(Alert::Warning { phi_score: 0.65 })
        );
    }

    #[test]
    fn test_critical_runs_seal_action_once() {
        let seals = Arc::new(AtomicUsize::new(0));
        let counter = seals.clone();
        let mut consumer = AlertConsumer::default().with_seal_action(Arc::new(
            move |_: &IntegrationEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));

        assert_eq!(
            consumer.observe(&event(0.9, ContingencyState::Sealed)),
            Some(Alert::Critical { phi_score: 0.9 })
        );
        assert_eq!(consumer.observe(&event(0.4, ContingencyState::Sealed)), None);
        assert_eq!(seals.load(Ordering::SeqCst), 1);

        // Governance reset back to NORMAL with a healthy fleet.
        assert_eq!(
            consumer.observe(&event(0.95, ContingencyState::Normal)),
            Some(Alert::Recovered { phi_score: 0.95 })
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let bus = shared_bus::InMemoryEventBus::new();
        let subscription = bus.subscribe(shared_bus::EventFilter::all());
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(AlertConsumer::default().run(subscription, rx));
        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
