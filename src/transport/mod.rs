//! API transport trait: the boundary between the session core and the network
//!
//! Hosts plug in any HTTP stack by implementing `ApiTransport`. The crate
//! ships a reqwest-based `HttpTransport` and a scripted `MemoryTransport`.

use crate::error::Result;
use async_trait::async_trait;

pub mod http;
pub mod memory;

/// Raw reply from the backend
///
/// Transports only report transport-level failures as errors; the status
/// code and body are interpreted by `crate::response`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,

    /// UTF-8 response body
    pub body: String,
}

impl TransportResponse {
    /// 200 reply with the given body
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Reply with an explicit status
    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Core trait for reaching the Playmanity backend
///
/// Paths are relative to the configured server URL (e.g.
/// `/games/sessions/heartbeat`). Cancellation is cooperative: callers drop
/// the returned future to abort an in-flight request.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// POST a JSON body and return the raw reply
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<TransportResponse>;

    /// GET a path and return the raw reply
    async fn get(&self, path: &str) -> Result<TransportResponse>;

    /// Transport name (e.g., "http", "memory")
    fn name(&self) -> &str;
}
