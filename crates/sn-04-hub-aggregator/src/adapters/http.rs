//! # Hub HTTP Surface
//!
//! ```text
//! POST /api/v1/heartbeat            heartbeat admission (rate limited)
//! GET  /health                      liveness + current Φ
//! GET  /api/v1/fleet                fleet snapshot
//! POST /api/v1/anomaly              { node_id, density }   (bearer token)
//! POST /api/v1/governance/seal      { reason }             (bearer token)
//! POST /api/v1/governance/reset     { reason }             (bearer token)
//! ```
//!
//! Every non-200 answer carries `{ "error": string }`.

use crate::domain::errors::GovernanceError;
use crate::ports::inbound::HubApi;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use shared_types::{
    ContingencyState, ErrorBody, IntegrationEvent, NodeId, RateLimiter, HEARTBEAT_PATH,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower::limit::ConcurrencyLimitLayer;
use tracing::warn;

pub const HEALTH_PATH: &str = "/health";
pub const FLEET_PATH: &str = "/api/v1/fleet";
pub const ANOMALY_PATH: &str = "/api/v1/anomaly";
pub const SEAL_PATH: &str = "/api/v1/governance/seal";
pub const RESET_PATH: &str = "/api/v1/governance/reset";

/// Requests handled concurrently per route before callers queue.
const MAX_IN_FLIGHT: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRequest {
    pub node_id: String,
    pub density: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceRequest {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub phi_score: f64,
    pub contingency: ContingencyState,
    pub known_nodes: usize,
}

#[derive(Clone)]
pub struct HubHttpState {
    hub: Arc<dyn HubApi>,
    limiter: Arc<RateLimiter>,
    governance_token: Option<Arc<str>>,
    overloaded: Arc<AtomicU64>,
}

impl HubHttpState {
    pub fn new(hub: Arc<dyn HubApi>, limiter: RateLimiter) -> Self {
        Self {
            hub,
            limiter: Arc::new(limiter),
            governance_token: None,
            overloaded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Heartbeats refused by the rate limiter so far.
    #[must_use]
    pub fn overload_rejections(&self) -> u64 {
        self.overloaded.load(Ordering::Relaxed)
    }

    /// Enable the governance endpoints behind `token`.
    pub fn with_governance_token(mut self, token: impl Into<String>) -> Self {
        let token: String = token.into();
        self.governance_token = (!token.is_empty()).then(|| Arc::from(token));
        self
    }
}

pub fn router(state: HubHttpState) -> Router {
    Router::new()
        .route(HEARTBEAT_PATH, post(heartbeat))
        .route(HEALTH_PATH, get(health))
        .route(FLEET_PATH, get(fleet))
        .route(ANOMALY_PATH, post(anomaly))
        .route(SEAL_PATH, post(seal))
        .route(RESET_PATH, post(reset))
        .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

fn governance_error(error: GovernanceError) -> Response {
    let status = match error {
        GovernanceError::UnknownNode(_) => StatusCode::NOT_FOUND,
        GovernanceError::EmptyReason | GovernanceError::InvalidDensity(_) => {
            StatusCode::BAD_REQUEST
        }
    };
    error_response(status, error.to_string())
}

fn authorize(state: &HubHttpState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = &state.governance_token else {
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "governance endpoints are disabled",
        ));
    };
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or_default();
    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(())
    } else {
        warn!("Governance request with invalid token");
        Err(error_response(
            StatusCode::UNAUTHORIZED,
            "invalid governance token",
        ))
    }
}

fn event_response(result: Result<IntegrationEvent, GovernanceError>) -> Response {
    match result {
        Ok(event) => (StatusCode::OK, Json(event)).into_response(),
        Err(e) => governance_error(e),
    }
}

async fn heartbeat(State(state): State<HubHttpState>, body: Bytes) -> Response {
    if !state.limiter.try_acquire() {
        state.overloaded.fetch_add(1, Ordering::Relaxed);
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "hub overloaded");
    }
    match state.hub.on_heartbeat_body(&body) {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_response(status, e.to_string())
        }
    }
}

async fn health(State(state): State<HubHttpState>) -> Json<HealthResponse> {
    let snapshot = state.hub.snapshot();
    Json(HealthResponse {
        status: "ok".to_string(),
        phi_score: snapshot.phi_score,
        contingency: snapshot.contingency,
        known_nodes: snapshot.known_nodes,
    })
}

async fn fleet(State(state): State<HubHttpState>) -> Response {
    (StatusCode::OK, Json(state.hub.snapshot())).into_response()
}

async fn anomaly(
    State(state): State<HubHttpState>,
    headers: HeaderMap,
    Json(request): Json<AnomalyRequest>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    event_response(
        state
            .hub
            .report_anomaly(&NodeId::new(request.node_id), request.density),
    )
}

async fn seal(
    State(state): State<HubHttpState>,
    headers: HeaderMap,
    Json(request): Json<GovernanceRequest>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    event_response(state.hub.governance_seal(&request.reason))
}

async fn reset(
    State(state): State<HubHttpState>,
    headers: HeaderMap,
    Json(request): Json<GovernanceRequest>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    event_response(state.hub.governance_reset(&request.reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::HubConfig;
    use crate::domain::entities::FleetSnapshot;
    use crate::service::HubAggregator;
    use crate::test_utils::{FleetFixture, InMemoryHubStore, RecordingSink};
    use axum::body::Body;
    use axum::http::Request;
    use shared_types::{ControllableTimeSource, HeartbeatWire, HubAck, TimeSource};
    use tower::ServiceExt;

    const TOKEN: &str = "s3cret";

    struct TestApp {
        router: Router,
        state: HubHttpState,
        fleet: FleetFixture,
        clock: Arc<ControllableTimeSource>,
    }

    fn app_with(limiter: RateLimiter) -> TestApp {
        let fleet = FleetFixture::new(2);
        let clock = Arc::new(ControllableTimeSource::new(1_700_000_000_000));
        let hub = HubAggregator::new(
            HubConfig::for_testing(),
            fleet.directory(),
            Arc::new(RecordingSink::default()),
            Arc::new(InMemoryHubStore::default()),
            clock.clone(),
        )
        .unwrap();
        let state = HubHttpState::new(Arc::new(hub), limiter).with_governance_token(TOKEN);
        TestApp {
            router: router(state.clone()),
            state,
            fleet,
            clock,
        }
    }

    fn app() -> TestApp {
        app_with(RateLimiter::per_second(1_000))
    }

    fn post_json(path: &str, body: Vec<u8>, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(path).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body)
    }

    fn heartbeat_body(app: &TestApp, index: usize, sequence: u64) -> Vec<u8> {
        let heartbeat = app.fleet.heartbeat(index, sequence, app.clock.now());
        HeartbeatWire::from(&heartbeat).to_json().unwrap()
    }

    #[tokio::test]
    async fn test_heartbeat_status_codes() {
        let app = app();

        let (status, body) = send(
            &app.router,
            post_json(HEARTBEAT_PATH, heartbeat_body(&app, 0, 1), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ack = HubAck::from_json(&body).unwrap();
        assert_eq!(ack.contingency, ContingencyState::Normal);

        let (status, body) = send(
            &app.router,
            post_json(HEARTBEAT_PATH, heartbeat_body(&app, 0, 1), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(ErrorBody::from_json(&body).unwrap().error.contains("Replayed"));

        let forged = app.fleet.forged(1, 1, app.clock.now());
        let (status, _) = send(
            &app.router,
            post_json(
                HEARTBEAT_PATH,
                HeartbeatWire::from(&forged).to_json().unwrap(),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app.router,
            post_json(HEARTBEAT_PATH, br#"{"node_id":"x","hash":"zz"}"#.to_vec(), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_overload_answers_503() {
        let app = app_with(RateLimiter::new(1, 0));
        let (first, _) = send(
            &app.router,
            post_json(HEARTBEAT_PATH, heartbeat_body(&app, 0, 1), None),
        )
        .await;
        let (second, body) = send(
            &app.router,
            post_json(HEARTBEAT_PATH, heartbeat_body(&app, 0, 2), None),
        )
        .await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorBody::from_json(&body).unwrap().error, "hub overloaded");
        assert_eq!(app.state.overload_rejections(), 1);
    }

    #[tokio::test]
    async fn test_governance_requires_token() {
        let app = app();
        let body = serde_json::to_vec(&GovernanceRequest {
            reason: "drill".into(),
        })
        .unwrap();

        let (status, _) = send(&app.router, post_json(SEAL_PATH, body.clone(), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app.router, post_json(SEAL_PATH, body.clone(), Some("nope"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app.router, post_json(SEAL_PATH, body, Some(TOKEN))).await;
        assert_eq!(status, StatusCode::OK);
        let event: IntegrationEvent = serde_json::from_slice(&body).unwrap();
        assert!(event.contingency_activated);

        let (status, body) = send(
            &app.router,
            Request::get(FLEET_PATH).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let snapshot: FleetSnapshot = serde_json::from_slice(&body).unwrap();
        assert_eq!(snapshot.contingency, ContingencyState::Sealed);
        assert_eq!(snapshot.contingency_reason.as_deref(), Some("drill"));
    }

    #[tokio::test]
    async fn test_anomaly_for_unseen_node_is_404() {
        let app = app();
        let request = AnomalyRequest {
            node_id: app.fleet.node_id(1).to_string(),
            density: 0.95,
        };
        let (status, _) = send(
            &app.router,
            post_json(
                ANOMALY_PATH,
                serde_json::to_vec(&request).unwrap(),
                Some(TOKEN),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_governance_disabled_without_token() {
        let fleet = FleetFixture::new(1);
        let hub = HubAggregator::new(
            HubConfig::for_testing(),
            fleet.directory(),
            Arc::new(RecordingSink::default()),
            Arc::new(InMemoryHubStore::default()),
            Arc::new(ControllableTimeSource::new(0)),
        )
        .unwrap();
        let router = router(HubHttpState::new(
            Arc::new(hub),
            RateLimiter::per_second(10),
        ));
        let body = br#"{"reason":"x"}"#.to_vec();
        let (status, _) = send(&router, post_json(RESET_PATH, body, Some(""))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&router, Request::get(HEALTH_PATH).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.phi_score, 1.0);
    }
}
