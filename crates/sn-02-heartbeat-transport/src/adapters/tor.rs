//! HTTP over a local Tor SOCKS proxy.
//!
//! `socks5h` makes the proxy resolve the `.onion` name, so nothing about the
//! hub address ever reaches the local resolver. Without a proxy the channel
//! posts directly, which is only meant for loopback development hubs.

use crate::domain::errors::ChannelError;
use crate::ports::outbound::{AnonymousChannel, ChannelResponse};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Settings for [`TorHttpChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorChannelConfig {
    /// `host:port` of the SOCKS listener; `None` posts directly.
    pub socks_proxy: Option<String>,
    /// Whole-request timeout enforced by the HTTP client.
    pub request_timeout: Duration,
    /// Budget for the readiness probe.
    pub probe_timeout: Duration,
}

impl Default for TorChannelConfig {
    fn default() -> Self {
        Self {
            socks_proxy: Some("127.0.0.1:9050".to_string()),
            request_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

/// Errors building the channel.
#[derive(Debug, Error)]
pub enum TorChannelBuildError {
    #[error("Invalid proxy URL: {0}")]
    InvalidProxyUrl(String),

    #[error("Failed to create HTTP client: {0}")]
    ClientCreationFailed(String),
}

/// [`AnonymousChannel`] backed by `reqwest` through Tor.
pub struct TorHttpChannel {
    client: reqwest::Client,
    config: TorChannelConfig,
}

impl TorHttpChannel {
    pub fn new(config: TorChannelConfig) -> Result<Self, TorChannelBuildError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("sentinel-node");
        match &config.socks_proxy {
            Some(socks) => {
                let proxy = reqwest::Proxy::all(format!("socks5h://{socks}"))
                    .map_err(|e| TorChannelBuildError::InvalidProxyUrl(e.to_string()))?;
                builder = builder.proxy(proxy);
            }
            None => {
                warn!("No SOCKS proxy configured, heartbeats are sent in the clear");
                builder = builder.no_proxy();
            }
        }

        let client = builder
            .build()
            .map_err(|e| TorChannelBuildError::ClientCreationFailed(e.to_string()))?;

        Ok(Self { client, config })
    }
}

fn url_for(onion_address: &str, path: &str) -> String {
    let base = onion_address.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{}{}", base, path)
    } else {
        format!("http://{}{}", base, path)
    }
}

fn map_error(e: reqwest::Error) -> ChannelError {
    if e.is_timeout() {
        ChannelError::Timeout
    } else if e.is_connect() {
        ChannelError::CircuitBuildFailed(e.to_string())
    } else if e.is_request() || e.is_body() {
        ChannelError::ConnectionReset(e.to_string())
    } else {
        ChannelError::Other(e.to_string())
    }
}

#[async_trait]
impl AnonymousChannel for TorHttpChannel {
    async fn post(
        &self,
        onion_address: &str,
        path: &str,
        body: Vec<u8>,
    ) -> Result<ChannelResponse, ChannelError> {
        let url = url_for(onion_address, path);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_error)?.to_vec();
        debug!(status, bytes = body.len(), "Hub responded");

        Ok(ChannelResponse { status, body })
    }

    async fn is_ready(&self) -> bool {
        let Some(socks) = &self.config.socks_proxy else {
            return true;
        };
        matches!(
            tokio::time::timeout(self.config.probe_timeout, TcpStream::connect(socks)).await,
            Ok(Ok(_))
        )
    }
}
