//! # Hub Runtime
//!
//! Owns the aggregator and everything around it:
//!
//! - axum server: heartbeat admission, admin surface, `/metrics`
//! - liveness sweep every `liveness_sweep_interval_ms`
//! - ledger flush every `persist_interval_ms` and once more on shutdown
//! - alert consumer and metrics bridge on the fleet event bus

use crate::container::SentinelConfig;
use crate::wiring::{record_snapshot, run_hub_metrics, AlertConsumer, OverloadTally};
use anyhow::{Context, Result};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use shared_bus::{EventFilter, EventTopic, InMemoryEventBus};
use shared_types::{RateLimiter, SystemTimeSource, TimeSource};
use sn_04_hub_aggregator::{
    router, EventBusSink, HubAggregator, HubApi, HubHttpState, JsonFileHubStore, KeyDirectory,
    StaticKeyDirectory,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

pub const METRICS_PATH: &str = "/metrics";

pub type SentinelHub = HubAggregator<StaticKeyDirectory, EventBusSink, JsonFileHubStore>;

pub struct HubRuntime {
    hub: Arc<SentinelHub>,
    bus: Arc<InMemoryEventBus>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl HubRuntime {
    /// Validate `config`, restore state and start serving.
    pub async fn start(config: &SentinelConfig) -> Result<Self> {
        Self::start_with_clock(config, Arc::new(SystemTimeSource)).await
    }

    pub async fn start_with_clock(
        config: &SentinelConfig,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        config.validate_for_hub()?;
        let hub_section = &config.hub;

        let keys = StaticKeyDirectory::from_file(&hub_section.key_directory_file)
            .context("failed to load the key directory")?;
        info!(
            nodes = keys.len(),
            path = %hub_section.key_directory_file.display(),
            "Key directory loaded"
        );
        let store = JsonFileHubStore::open(&hub_section.state_file)
            .context("failed to open the hub state file")?;
        let bus = Arc::new(InMemoryEventBus::with_capacity(hub_section.event_buffer));
        let hub = Arc::new(
            HubAggregator::new(
                config.hub_config(),
                keys,
                EventBusSink::new(Arc::clone(&bus)),
                store,
                time,
            )
            .context("failed to restore hub state")?,
        );
        record_snapshot(&hub.snapshot());

        let listen_addr = config.listen_addr()?;
        let listener = TcpListener::bind(listen_addr)
            .await
            .with_context(|| format!("failed to bind {listen_addr}"))?;
        let local_addr = listener.local_addr()?;

        let limiter = RateLimiter::per_second(hub_section.max_heartbeats_per_sec);
        let http_state = HubHttpState::new(Arc::clone(&hub) as Arc<dyn HubApi>, limiter)
            .with_governance_token(hub_section.governance_token.clone());
        if hub_section.governance_token.is_empty() {
            warn!("No governance token configured; governance endpoints are disabled");
        }
        let app = router(http_state.clone())
            .merge(Router::new().route(METRICS_PATH, get(metrics)));

        let (shutdown_tx, _) = watch::channel(false);
        let mut tasks = Vec::new();

        let mut server_shutdown = shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            });
            if let Err(e) = serve.await {
                error!(error = %e, "Hub server failed");
            }
        }));

        tasks.push(spawn_sweeper(
            Arc::clone(&hub),
            http_state,
            Duration::from_millis(hub_section.liveness_sweep_interval_ms),
            shutdown_tx.subscribe(),
        ));
        tasks.push(spawn_persister(
            Arc::clone(&hub),
            Duration::from_millis(hub_section.persist_interval_ms),
            shutdown_tx.subscribe(),
        ));
        tasks.push(tokio::spawn(
            AlertConsumer::new(hub_section.phi_warning_threshold)
                .run(
                    bus.subscribe(EventFilter::topics(vec![EventTopic::Integrity])),
                    shutdown_tx.subscribe(),
                ),
        ));
        tasks.push(tokio::spawn(run_hub_metrics(
            bus.subscribe(EventFilter::all()),
            shutdown_tx.subscribe(),
        )));

        info!(
            addr = %local_addr,
            phi = hub.phi_score(),
            contingency = %hub.contingency(),
            "Hub listening"
        );
        Ok(Self {
            hub,
            bus,
            local_addr,
            shutdown_tx,
            tasks,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn hub(&self) -> Arc<SentinelHub> {
        Arc::clone(&self.hub)
    }

    #[must_use]
    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    /// Stop background tasks and the server, then flush the ledger.
    pub async fn shutdown(self) -> Result<()> {
        info!("Hub runtime shutting down");
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Hub task ended abnormally");
            }
        }
        self.hub.persist().context("final state flush failed")?;
        info!(stats = ?self.hub.get_stats(), "Hub stopped");
        Ok(())
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn spawn_sweeper(
    hub: Arc<SentinelHub>,
    http_state: HubHttpState,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);
        let mut overload = OverloadTally::default();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    hub.sweep_liveness();
                    record_snapshot(&hub.snapshot());
                    overload.record(http_state.overload_rejections());
                }
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }
    })
}

fn spawn_persister(
    hub: Arc<SentinelHub>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = hub.persist() {
                        warn!(error = %e, "Periodic state flush failed");
                    }
                }
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }
    })
}

async fn metrics() -> Response {
    match sentinel_telemetry::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
