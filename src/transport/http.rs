//! reqwest-backed transport

use super::{ApiTransport, TransportResponse};
use crate::config::ClientConfig;
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use std::time::Duration;

/// HTTP transport for the Playmanity REST API
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from client configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .user_agent(concat!("playmanity-session/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Base URL every path is joined onto
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read(&self, path: &str, response: reqwest::Response) -> Result<TransportResponse> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.classify(path, e))?;

        tracing::trace!(endpoint = %path, status, bytes = body.len(), "Response received");
        Ok(TransportResponse { status, body })
    }

    fn classify(&self, path: &str, err: reqwest::Error) -> SessionError {
        if err.is_timeout() {
            SessionError::Timeout {
                endpoint: path.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            SessionError::transport(path, err)
        }
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<TransportResponse> {
        tracing::debug!(endpoint = %path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(path, e))?;
        self.read(path, response).await
    }

    async fn get(&self, path: &str) -> Result<TransportResponse> {
        tracing::debug!(endpoint = %path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| self.classify(path, e))?;
        self.read(path, response).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
