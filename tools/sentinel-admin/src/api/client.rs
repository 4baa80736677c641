//! Admin API client for the hub's governance surface.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{ErrorBody, IntegrationEvent};
use sn_04_hub_aggregator::{
    AnomalyRequest, FleetSnapshot, GovernanceRequest, HealthResponse, ANOMALY_PATH, FLEET_PATH,
    HEALTH_PATH, RESET_PATH, SEAL_PATH,
};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when communicating with the hub.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cannot connect to {0}")]
    Connection(String),

    #[error("Hub answered {status}: {message}")]
    Hub { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid proxy: {0}")]
    Proxy(String),
}

/// Admin API client.
pub struct HubAdminClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HubAdminClient {
    /// Client for `base_url` (`http://host:port`), optionally through a
    /// SOCKS proxy for `.onion` hubs.
    pub fn new(base_url: impl Into<String>, socks_proxy: Option<&str>) -> Result<Self, ApiError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10));
        if let Some(proxy) = socks_proxy.filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(format!("socks5h://{proxy}"))
                .map_err(|e| ApiError::Proxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let base_url: String = base_url.into();
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Bearer token for governance calls.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token: String = token.into();
        self.token = (!token.is_empty()).then_some(token);
        self
    }

    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.send(self.client.get(self.url(HEALTH_PATH))).await
    }

    pub async fn fleet(&self) -> Result<FleetSnapshot, ApiError> {
        self.send(self.client.get(self.url(FLEET_PATH))).await
    }

    pub async fn seal(&self, reason: &str) -> Result<IntegrationEvent, ApiError> {
        self.post(
            SEAL_PATH,
            &GovernanceRequest {
                reason: reason.to_string(),
            },
        )
        .await
    }

    pub async fn reset(&self, reason: &str) -> Result<IntegrationEvent, ApiError> {
        self.post(
            RESET_PATH,
            &GovernanceRequest {
                reason: reason.to_string(),
            },
        )
        .await
    }

    pub async fn report_anomaly(
        &self,
        node_id: &str,
        density: f64,
    ) -> Result<IntegrationEvent, ApiError> {
        self.post(
            ANOMALY_PATH,
            &AnomalyRequest {
                node_id: node_id.to_string(),
                density,
            },
        )
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, ApiError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ApiError::Connection(self.base_url.clone())
            } else {
                ApiError::Http(e)
            }
        })?;

        let status = response.status();
        let response_url = response.url().clone();
        let body = response.bytes().await?;
        debug!(url = %response_url, status = status.as_u16(), bytes = body.len(), "Hub answered");
        if status != StatusCode::OK {
            let message = ErrorBody::from_json(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(ApiError::Hub {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_slice(&body).map_err(|e| ApiError::Parse(e.to_string()))
    }
}
