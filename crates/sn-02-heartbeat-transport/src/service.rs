//! # Heartbeat Transport Service
//!
//! Retry loop plus per-node supersession over an [`AnonymousChannel`].
//!
//! ## Supersession
//!
//! Each node owns a lane with a gate mutex and the cancel handle of its
//! current delivery. A newer delivery signals cancel, installs itself as
//! current, then waits on the gate; the older delivery observes the cancel
//! at its next suspension point, returns `Superseded` and releases the gate.

use crate::domain::entities::{AttemptEvent, AttemptOutcome, DeliveryReceipt, DeliveryResult};
use crate::domain::errors::{ChannelError, TransportError};
use crate::domain::retry::RetryPolicy;
use crate::domain::status::{classify_response, Verdict};
use crate::ports::inbound::HeartbeatDelivery;
use crate::ports::outbound::{AnonymousChannel, AttemptObserver};
use async_trait::async_trait;
use dashmap::DashMap;
use shared_types::{Heartbeat, HeartbeatWire, NodeId, Sequence};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Snapshot of transport counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub deliveries_started: u64,
    pub delivered: u64,
    pub exhausted: u64,
    pub rejected: u64,
    pub superseded: u64,
    pub attempts: u64,
}

#[derive(Default)]
struct Counters {
    deliveries_started: AtomicU64,
    delivered: AtomicU64,
    exhausted: AtomicU64,
    rejected: AtomicU64,
    superseded: AtomicU64,
    attempts: AtomicU64,
}

struct InFlight {
    sequence: Sequence,
    cancel: watch::Sender<Option<Sequence>>,
}

#[derive(Default)]
struct Lane {
    gate: Arc<tokio::sync::Mutex<()>>,
    current: parking_lot::Mutex<Option<InFlight>>,
}

/// Clears the lane's current slot if it still belongs to this delivery,
/// including when the delivery future is dropped.
struct LaneGuard {
    lane: Arc<Lane>,
    sequence: Sequence,
}

impl Drop for LaneGuard {
    fn drop(&mut self) {
        let mut current = self.lane.current.lock();
        if current.as_ref().map(|f| f.sequence) == Some(self.sequence) {
            *current = None;
        }
    }
}

/// Heartbeat transport with retry, backoff and per-node supersession.
pub struct HeartbeatTransport<C: AnonymousChannel> {
    channel: C,
    policy: RetryPolicy,
    lanes: DashMap<NodeId, Arc<Lane>>,
    observers: Vec<Arc<dyn AttemptObserver>>,
    counters: Counters,
}

impl<C: AnonymousChannel> HeartbeatTransport<C> {
    pub fn new(channel: C, policy: RetryPolicy) -> Self {
        Self {
            channel,
            policy,
            lanes: DashMap::new(),
            observers: Vec::new(),
            counters: Counters::default(),
        }
    }

    /// Register an observer that sees every attempt of every delivery.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    #[must_use]
    pub fn get_stats(&self) -> TransportStats {
        TransportStats {
            deliveries_started: self.counters.deliveries_started.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            exhausted: self.counters.exhausted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            superseded: self.counters.superseded.load(Ordering::Relaxed),
            attempts: self.counters.attempts.load(Ordering::Relaxed),
        }
    }

    fn lane(&self, node_id: &NodeId) -> Arc<Lane> {
        self.lanes
            .entry(node_id.clone())
            .or_insert_with(|| Arc::new(Lane::default()))
            .clone()
    }

    /// Install `sequence` as the lane's current delivery, cancelling any older one.
    fn claim(
        &self,
        lane: &Arc<Lane>,
        sequence: Sequence,
    ) -> Result<watch::Receiver<Option<Sequence>>, TransportError> {
        let mut current = lane.current.lock();
        if let Some(in_flight) = current.as_ref() {
            if sequence <= in_flight.sequence {
                return Err(TransportError::Outdated {
                    sequence,
                    in_flight: in_flight.sequence,
                });
            }
            let _ = in_flight.cancel.send(Some(sequence));
        }
        let (cancel, cancelled) = watch::channel(None);
        *current = Some(InFlight { sequence, cancel });
        Ok(cancelled)
    }

    fn notify(&self, observer: &dyn AttemptObserver, event: AttemptEvent) {
        observer.on_attempt(&event);
        for global in &self.observers {
            global.on_attempt(&event);
        }
    }

    async fn run_attempts(
        &self,
        onion_address: &str,
        path: &str,
        heartbeat: &Heartbeat,
        body: Vec<u8>,
        cancelled: &mut watch::Receiver<Option<Sequence>>,
        observer: &dyn AttemptObserver,
    ) -> DeliveryResult {
        let node_id = heartbeat.node_id();
        let sequence = heartbeat.sequence();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff_delays = Vec::new();

        for attempt in 1..=max_attempts {
            self.counters.attempts.fetch_add(1, Ordering::Relaxed);

            let response = tokio::select! {
                biased;
                by = superseded(cancelled) => {
                    return Err(TransportError::Superseded { sequence, by });
                }
                r = tokio::time::timeout(
                    self.policy.attempt_timeout,
                    self.channel.post(onion_address, path, body.clone()),
                ) => r.unwrap_or(Err(ChannelError::Timeout)),
            };

            let (reason, overload) = match response {
                Ok(response) => match classify_response(&response) {
                    Verdict::Ack(ack) => {
                        self.notify(
                            observer,
                            attempt_event(node_id, sequence, attempt, AttemptOutcome::Delivered, None),
                        );
                        info!(
                            node_id = %node_id,
                            sequence,
                            attempt,
                            phi = ack.phi_score,
                            contingency = %ack.contingency,
                            "Heartbeat delivered"
                        );
                        return Ok(DeliveryReceipt {
                            ack,
                            attempts: attempt,
                            backoff_delays,
                        });
                    }
                    Verdict::Rejected { reason, message } => {
                        self.notify(
                            observer,
                            attempt_event(node_id, sequence, attempt, AttemptOutcome::Rejected, None),
                        );
                        warn!(node_id = %node_id, sequence, %reason, %message, "Heartbeat rejected by hub");
                        return Err(TransportError::Rejected { reason, message });
                    }
                    Verdict::Transient { reason, overload } => (reason, overload),
                },
                Err(e) => (e.to_string(), false),
            };

            let outcome = if overload {
                AttemptOutcome::Overload
            } else {
                AttemptOutcome::Transient
            };

            if attempt == max_attempts {
                self.notify(observer, attempt_event(node_id, sequence, attempt, outcome, None));
                warn!(node_id = %node_id, sequence, attempts = attempt, error = %reason, "Delivery exhausted");
                return Err(TransportError::Exhausted {
                    attempts: attempt,
                    last_error: reason,
                    overloaded: overload,
                });
            }

            let delay = self.policy.delay_for(attempt, overload);
            self.notify(
                observer,
                attempt_event(node_id, sequence, attempt, outcome, Some(delay)),
            );
            debug!(
                node_id = %node_id,
                sequence,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %reason,
                "Transient delivery failure, backing off"
            );
            backoff_delays.push(delay);

            tokio::select! {
                biased;
                by = superseded(cancelled) => {
                    return Err(TransportError::Superseded { sequence, by });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        // max_attempts >= 1, so the loop always returns.
        Err(TransportError::Exhausted {
            attempts: max_attempts,
            last_error: "no attempt made".to_string(),
            overloaded: false,
        })
    }
}

fn attempt_event(
    node_id: &NodeId,
    sequence: Sequence,
    attempt: u32,
    outcome: AttemptOutcome,
    next_delay: Option<Duration>,
) -> AttemptEvent {
    AttemptEvent {
        node_id: node_id.clone(),
        sequence,
        attempt,
        outcome,
        next_delay,
    }
}

/// Resolves with the superseding sequence once cancel is signalled.
async fn superseded(cancelled: &mut watch::Receiver<Option<Sequence>>) -> Sequence {
    loop {
        if let Some(by) = *cancelled.borrow_and_update() {
            return by;
        }
        if cancelled.changed().await.is_err() {
            // Sender gone without a cancel: never resolves.
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl<C: AnonymousChannel> HeartbeatDelivery for HeartbeatTransport<C> {
    async fn deliver(
        &self,
        onion_address: &str,
        path: &str,
        heartbeat: Heartbeat,
        observer: &dyn AttemptObserver,
    ) -> DeliveryResult {
        let body = HeartbeatWire::from(&heartbeat).to_json()?;
        let node_id = heartbeat.node_id().clone();
        let sequence = heartbeat.sequence();

        let lane = self.lane(&node_id);
        let mut cancelled = self.claim(&lane, sequence)?;
        let _guard = LaneGuard {
            lane: Arc::clone(&lane),
            sequence,
        };
        self.counters.deliveries_started.fetch_add(1, Ordering::Relaxed);

        // Wait for any older delivery to stop before the first attempt.
        let gate = Arc::clone(&lane.gate);
        let _permit = tokio::select! {
            biased;
            by = superseded(&mut cancelled) => {
                self.counters.superseded.fetch_add(1, Ordering::Relaxed);
                debug!(node_id = %node_id, sequence, by, "Superseded while waiting for lane");
                return Err(TransportError::Superseded { sequence, by });
            }
            permit = gate.lock_owned() => permit,
        };

        let result = self
            .run_attempts(onion_address, path, &heartbeat, body, &mut cancelled, observer)
            .await;

        match &result {
            Ok(_) => self.counters.delivered.fetch_add(1, Ordering::Relaxed),
            Err(TransportError::Exhausted { .. }) => {
                self.counters.exhausted.fetch_add(1, Ordering::Relaxed)
            }
            Err(TransportError::Rejected { .. }) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed)
            }
            Err(TransportError::Superseded { by, .. }) => {
                debug!(node_id = %node_id, sequence, by, "Delivery superseded");
                self.counters.superseded.fetch_add(1, Ordering::Relaxed)
            }
            Err(_) => 0,
        };

        result
    }

    async fn is_channel_ready(&self) -> bool {
        self.channel.is_ready().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::RejectReason;
    use crate::ports::outbound::NoopObserver;
    use crate::test_utils::{ack_response, heartbeat, Scripted, ScriptedChannel};
    use parking_lot::Mutex;
    use shared_types::HEARTBEAT_PATH;

    const ONION: &str = "hubexampleonionaddress.onion";

    fn transport(script: Vec<Scripted>) -> Arc<HeartbeatTransport<ScriptedChannel>> {
        Arc::new(HeartbeatTransport::new(
            ScriptedChannel::new(script),
            RetryPolicy::for_testing(),
        ))
    }

    #[tokio::test]
    async fn test_three_transient_failures_then_success() {
        let transport = transport(vec![
            Scripted::Fail(ChannelError::CircuitBuildFailed("no circuit".into())),
            Scripted::Fail(ChannelError::ConnectionReset("reset".into())),
            Scripted::Status(502),
            ack_response(0.95),
        ]);

        let receipt = transport
            .deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 1), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(receipt.attempts, 4);
        assert_eq!(receipt.backoff_delays.len(), 3);
        assert!(receipt
            .backoff_delays
            .windows(2)
            .all(|w| w[0] <= w[1]));
        assert!(receipt
            .backoff_delays
            .iter()
            .all(|d| *d <= transport.policy().max_delay));
        assert_eq!(transport.channel().posts(), 4);
        assert_eq!(transport.get_stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_after_max_attempts() {
        let transport = transport(vec![Scripted::Fail(ChannelError::Timeout); 6]);

        let result = transport
            .deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 1), &NoopObserver)
            .await;

        assert!(matches!(
            result,
            Err(TransportError::Exhausted { attempts: 6, overloaded: false, .. })
        ));
        assert_eq!(transport.channel().posts(), 6);
    }

    #[tokio::test]
    async fn test_overload_backs_off_harder_and_is_reported() {
        let transport = Arc::new(HeartbeatTransport::new(
            ScriptedChannel::new(vec![Scripted::Status(503); 3]),
            RetryPolicy {
                max_attempts: 3,
                ..RetryPolicy::for_testing()
            },
        ));
        let delays = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&delays);
        let observer = move |event: &AttemptEvent| {
            if let Some(delay) = event.next_delay {
                seen.lock().push((event.outcome, delay));
            }
        };

        let result = transport
            .deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 1), &observer)
            .await;

        assert!(result.as_ref().err().is_some_and(TransportError::is_overload));
        let delays = delays.lock().clone();
        assert_eq!(
            delays,
            vec![
                (AttemptOutcome::Overload, Duration::from_millis(20)),
                (AttemptOutcome::Overload, Duration::from_millis(40)),
            ]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_and_conflict_are_not_retried() {
        let transport = transport(vec![Scripted::Status(401)]);
        let result = transport
            .deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 1), &NoopObserver)
            .await;
        assert!(matches!(
            result,
            Err(TransportError::Rejected { reason: RejectReason::Unauthorized, .. })
        ));
        assert_eq!(transport.channel().posts(), 1);

        let transport = self::transport(vec![Scripted::Status(409)]);
        let result = transport
            .deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 2), &NoopObserver)
            .await;
        assert!(matches!(
            result,
            Err(TransportError::Rejected { reason: RejectReason::Conflict, .. })
        ));
        assert_eq!(transport.channel().posts(), 1);
    }

    #[tokio::test]
    async fn test_hung_attempt_times_out_and_retries() {
        let transport = transport(vec![Scripted::Hang, ack_response(1.0)]);
        let receipt = transport
            .deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 1), &NoopObserver)
            .await
            .unwrap();
        assert_eq!(receipt.attempts, 2);
    }

    #[tokio::test]
    async fn test_newer_heartbeat_supersedes_pending_delivery() {
        let transport = Arc::new(HeartbeatTransport::new(
            ScriptedChannel::new(vec![
                Scripted::Fail(ChannelError::Timeout),
                Scripted::Fail(ChannelError::Timeout),
                ack_response(0.9),
            ]),
            RetryPolicy {
                base_delay: Duration::from_millis(200),
                max_delay: Duration::from_millis(400),
                ..RetryPolicy::for_testing()
            },
        ));

        let older = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                transport
                    .deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 1), &NoopObserver)
                    .await
            })
        };
        // Let the older delivery fail once and enter backoff.
        transport.channel().wait_for_posts(1).await;

        let newer = transport
            .deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 2), &NoopObserver)
            .await;
        let older = older.await.unwrap();

        assert_eq!(
            older,
            Err(TransportError::Superseded { sequence: 1, by: 2 })
        );
        assert!(newer.is_ok());
        // The superseded delivery never posted after the cancel.
        let sequences = transport.channel().posted_sequences();
        assert_eq!(sequences.first(), Some(&1));
        assert!(sequences[1..].iter().all(|s| *s == 2));
        assert_eq!(transport.get_stats().superseded, 1);
    }

    #[tokio::test]
    async fn test_older_sequence_is_outdated_while_newer_in_flight() {
        let transport = transport(vec![Scripted::Hang, ack_response(1.0)]);

        let newer = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                transport
                    .deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 5), &NoopObserver)
                    .await
            })
        };
        transport.channel().wait_for_posts(1).await;

        let result = transport
            .deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 5), &NoopObserver)
            .await;
        assert_eq!(
            result,
            Err(TransportError::Outdated { sequence: 5, in_flight: 5 })
        );
        assert!(newer.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_different_nodes_do_not_supersede_each_other() {
        let transport = transport(vec![ack_response(1.0), ack_response(1.0)]);
        let (a, b) = tokio::join!(
            transport.deliver(ONION, HEARTBEAT_PATH, heartbeat("node-a", 1), &NoopObserver),
            transport.deliver(ONION, HEARTBEAT_PATH, heartbeat("node-b", 1), &NoopObserver),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
    }
}
