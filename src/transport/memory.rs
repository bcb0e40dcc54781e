//! In-memory transport
//!
//! Serves scripted replies per path and records every call. Useful for
//! tests and for hosts that want to run without a backend.

use super::{ApiTransport, TransportResponse};
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A scripted reply
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Return this reply immediately
    Reply(TransportResponse),

    /// Fail with a transport error
    Fail(String),

    /// Wait, then return the reply
    Delayed(Duration, TransportResponse),

    /// Never complete (until the caller drops the future)
    Hang,
}

/// A recorded request
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// "POST" or "GET"
    pub method: &'static str,

    /// Request path
    pub path: String,

    /// JSON body (null for GET)
    pub body: serde_json::Value,

    /// When the request reached the transport
    pub at: Instant,
}

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Scripted>>,
    defaults: HashMap<String, Scripted>,
    calls: Vec<CallRecord>,
}

/// Scripted in-memory transport
///
/// Queued replies for a path are consumed first; once the queue is empty
/// the path's default reply is used. Paths with neither fail with a
/// transport error.
#[derive(Default)]
pub struct MemoryTransport {
    script: Mutex<Script>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a scripted reply for a path
    pub fn push(&self, path: &str, reply: Scripted) {
        self.lock()
            .queued
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Queue a 200 JSON reply for a path
    pub fn push_json(&self, path: &str, body: serde_json::Value) {
        self.push(path, Scripted::Reply(TransportResponse::ok(body.to_string())));
    }

    /// Queue a transport failure for a path
    pub fn push_failure(&self, path: &str, reason: &str) {
        self.push(path, Scripted::Fail(reason.to_string()));
    }

    /// Queue a request that never completes
    pub fn push_hang(&self, path: &str) {
        self.push(path, Scripted::Hang);
    }

    /// Set the reply used once a path's queue is exhausted
    pub fn set_default(&self, path: &str, reply: Scripted) {
        self.lock().defaults.insert(path.to_string(), reply);
    }

    /// Set a 200 JSON default reply for a path
    pub fn set_default_json(&self, path: &str, body: serde_json::Value) {
        self.set_default(path, Scripted::Reply(TransportResponse::ok(body.to_string())));
    }

    /// All recorded calls, in arrival order
    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    /// Recorded calls for one path
    pub fn calls_to(&self, path: &str) -> Vec<CallRecord> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.path == path)
            .cloned()
            .collect()
    }

    /// Number of calls made to a path
    pub fn count(&self, path: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.path == path).count()
    }

    fn record(&self, method: &'static str, path: &str, body: serde_json::Value) -> Option<Scripted> {
        let mut script = self.lock();
        script.calls.push(CallRecord {
            method,
            path: path.to_string(),
            body,
            at: Instant::now(),
        });

        let queued = script.queued.get_mut(path).and_then(VecDeque::pop_front);
        queued.or_else(|| script.defaults.get(path).cloned())
    }

    async fn respond(&self, path: &str, scripted: Option<Scripted>) -> Result<TransportResponse> {
        match scripted {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Fail(reason)) => Err(SessionError::transport(path, reason)),
            Some(Scripted::Delayed(delay, reply)) => {
                tokio::time::sleep(delay).await;
                Ok(reply)
            }
            Some(Scripted::Hang) => futures::future::pending().await,
            None => Err(SessionError::transport(path, "no scripted reply")),
        }
    }
}

#[async_trait]
impl ApiTransport for MemoryTransport {
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<TransportResponse> {
        let scripted = self.record("POST", path, body.clone());
        self.respond(path, scripted).await
    }

    async fn get(&self, path: &str) -> Result<TransportResponse> {
        let scripted = self.record("GET", path, serde_json::Value::Null);
        self.respond(path, scripted).await
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_default() {
        let transport = MemoryTransport::new();
        transport.push_json("/a", serde_json::json!({"n": 1}));
        transport.set_default_json("/a", serde_json::json!({"n": 0}));

        let first = transport.post_json("/a", &serde_json::json!({})).await.unwrap();
        let second = transport.post_json("/a", &serde_json::json!({})).await.unwrap();
        let third = transport.get("/a").await.unwrap();

        assert_eq!(first.body, r#"{"n":1}"#);
        assert_eq!(second.body, r#"{"n":0}"#);
        assert_eq!(third.body, r#"{"n":0}"#);
        assert_eq!(transport.count("/a"), 3);
        assert_eq!(transport.calls()[2].method, "GET");
    }

    #[tokio::test]
    async fn test_unscripted_path_fails() {
        let transport = MemoryTransport::new();
        let err = transport.get("/missing").await.unwrap_err();
        assert!(matches!(err, SessionError::Transport { .. }));
        assert_eq!(transport.count("/missing"), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let transport = MemoryTransport::new();
        transport.push_failure("/a", "connection reset");
        let err = transport.post_json("/a", &serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_never_completes() {
        let transport = MemoryTransport::new();
        transport.push_hang("/a");
        let body = serde_json::json!({});
        let result = tokio::time::timeout(
            Duration::from_secs(60),
            transport.post_json("/a", &body),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_records_body() {
        let transport = MemoryTransport::new();
        transport.set_default_json("/a", serde_json::json!({"success": true}));
        transport
            .post_json("/a", &serde_json::json!({"auth_token": "abc"}))
            .await
            .unwrap();
        assert_eq!(transport.calls_to("/a")[0].body["auth_token"], "abc");
    }
}
