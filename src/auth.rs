//! Device authorization flow
//!
//! The game asks the backend for an authorization URL, the player approves
//! the device in a browser, and the game polls until it receives a token.

use crate::config::ClientConfig;
use crate::error::{Result, SessionError};
use crate::response::parse_payload;
use crate::transport::ApiTransport;
use crate::types::{AuthInitiateRequest, AuthStatus, AuthStatusResponse, PendingAuthorization};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const AUTH_INITIATE_PATH: &str = "/games/auth/initiate";

/// Status path for a pending authorization
pub fn auth_status_path(auth_id: &str) -> String {
    format!("/games/auth/status/{}", auth_id)
}

pub struct DeviceAuthorization {
    transport: Arc<dyn ApiTransport>,
    config: Arc<ClientConfig>,
}

impl DeviceAuthorization {
    pub fn new(config: Arc<ClientConfig>, transport: Arc<dyn ApiTransport>) -> Self {
        Self { transport, config }
    }

    /// Start authorization for a device
    ///
    /// The host opens `auth_url` for the player.
    pub async fn initiate(&self, device_id: &str) -> Result<PendingAuthorization> {
        let body = serde_json::to_value(AuthInitiateRequest {
            game_uuid: &self.config.game_uuid,
            device_id,
        })?;
        let reply = self
            .with_timeout(AUTH_INITIATE_PATH, self.transport.post_json(AUTH_INITIATE_PATH, &body))
            .await?;
        let pending: PendingAuthorization = parse_payload(AUTH_INITIATE_PATH, &reply)?;

        if pending.auth_id.is_empty() || pending.auth_url.is_empty() {
            return Err(SessionError::InvalidResponse(
                "auth initiation response is missing auth_id or auth_url".into(),
            ));
        }
        tracing::info!(auth_id = %pending.auth_id, "Device authorization started");
        Ok(pending)
    }

    /// Poll until the player approves or denies the device
    ///
    /// Transport and parse failures are logged and polling continues.
    pub async fn wait_for_token(
        &self,
        pending: &PendingAuthorization,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let path = auth_status_path(&pending.auth_id);
        let interval = self.config.auth_poll_interval();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                result = self.poll_status(&path) => result,
            };

            match result {
                Ok(status) => match status.status {
                    AuthStatus::Valid => match status.token.filter(|t| !t.is_empty()) {
                        Some(token) => {
                            tracing::info!("Device authorized");
                            return Ok(token);
                        }
                        None => tracing::warn!("Authorization valid but no token returned"),
                    },
                    AuthStatus::Denied => {
                        tracing::warn!("Device authorization denied");
                        return Err(SessionError::AuthDenied);
                    }
                    AuthStatus::Unresolved => tracing::debug!("Awaiting authorization"),
                },
                Err(e) => tracing::warn!(error = %e, "Auth status poll failed"),
            }
        }
    }

    async fn poll_status(&self, path: &str) -> Result<AuthStatusResponse> {
        let reply = self.with_timeout(path, self.transport.get(path)).await?;
        parse_payload(path, &reply)
    }

    async fn with_timeout<T>(
        &self,
        path: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let timeout = self.config.request_timeout();
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| SessionError::Timeout {
                endpoint: path.to_string(),
                secs: timeout.as_secs(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryTransport;

    fn flow() -> (DeviceAuthorization, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let config = Arc::new(ClientConfig::new("http://localhost/api", "game-1"));
        (DeviceAuthorization::new(config, transport.clone()), transport)
    }

    fn pending() -> PendingAuthorization {
        PendingAuthorization {
            auth_id: "a-1".into(),
            auth_url: "https://playmanity.net/authorize/a-1".into(),
        }
    }

    #[tokio::test]
    async fn test_initiate_sends_device_and_game() {
        let (flow, transport) = flow();
        transport.push_json(
            AUTH_INITIATE_PATH,
            serde_json::json!({"auth_id": "a-1", "auth_url": "https://playmanity.net/authorize/a-1"}),
        );

        let pending = flow.initiate("device-42").await.unwrap();
        assert_eq!(pending.auth_id, "a-1");

        let call = &transport.calls_to(AUTH_INITIATE_PATH)[0];
        assert_eq!(call.body["game_uuid"], "game-1");
        assert_eq!(call.body["device_id"], "device-42");
    }

    #[tokio::test]
    async fn test_initiate_rejects_incomplete_response() {
        let (flow, transport) = flow();
        transport.push_json(AUTH_INITIATE_PATH, serde_json::json!({"auth_id": "", "auth_url": "x"}));
        let err = flow.initiate("d").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidResponse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_valid() {
        let (flow, transport) = flow();
        let path = auth_status_path("a-1");
        transport.push_json(&path, serde_json::json!({"status": "unresolved"}));
        transport.push_failure(&path, "connection reset");
        transport.push_json(&path, serde_json::json!({"status": "valid", "token": "jwt-token"}));

        let token = flow
            .wait_for_token(&pending(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(token, "jwt-token");
        assert_eq!(transport.count(&path), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied() {
        let (flow, transport) = flow();
        let path = auth_status_path("a-1");
        transport.push_json(&path, serde_json::json!({"status": "denied"}));

        let err = flow
            .wait_for_token(&pending(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AuthDenied));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_polling() {
        let (flow, transport) = flow();
        let path = auth_status_path("a-1");
        transport.set_default_json(&path, serde_json::json!({"status": "unresolved"}));

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(3500)).await;
            canceller.cancel();
        });

        let err = flow.wait_for_token(&pending(), &cancel).await.unwrap_err();
        assert!(matches!(err, SessionError::Cancelled));
        assert_eq!(transport.count(&path), 3);
    }
}
