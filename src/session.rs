//! Session manager owning the single backend session
//!
//! Lifecycle: `Idle → Initializing → Active → Ending → Idle`. A heartbeat
//! task runs while the session is active; losing the session on the server
//! (`NO_ACTIVE_SESSION`) triggers one delayed re-initiation, any other
//! heartbeat failure just invalidates it.
//!
//! All flags live behind one mutex that is never held across an `.await`.
//! Validity changes bump an epoch counter so a heartbeat task belonging to
//! a superseded session cannot touch the current one.

use crate::config::ClientConfig;
use crate::error::{Result, SessionError};
use crate::response::{expect_success, parse_api_response, parse_payload};
use crate::transport::{ApiTransport, TransportResponse};
use crate::types::{
    Advertisement, AdvertisementRequest, AdvertisementResponse, ApiResponse, SessionEvent,
    SessionPhase, SessionRequest,
};
use futures::FutureExt;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

pub const INITIATE_PATH: &str = "/games/sessions/initiate";
pub const HEARTBEAT_PATH: &str = "/games/sessions/heartbeat";
pub const END_PATH: &str = "/games/sessions/end";
pub const ADVERTISEMENT_PATH: &str = "/advertisements";

const EVENT_CAPACITY: usize = 64;

/// Client for the backend session of one game process
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn ApiTransport>,
    config: Arc<ClientConfig>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,

    /// Cancelled once by `shutdown()`; parent of every heartbeat token
    shutdown: CancellationToken,
    shutdown_started: AtomicBool,

    /// Signalled whenever an initiation or end attempt finishes
    flag_cleared: Notify,
}

#[derive(Default)]
struct SessionState {
    auth_token: Option<String>,
    valid: bool,
    initializing: bool,
    ending: bool,
    epoch: u64,
    heartbeat: Option<Heartbeat>,
}

struct Heartbeat {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

#[derive(Clone, Copy)]
enum Flag {
    Initializing,
    Ending,
}

/// Clears an in-progress flag however the owning operation exits
struct FlagGuard<'a> {
    inner: &'a Inner,
    flag: Flag,
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        match self.flag {
            Flag::Initializing => state.initializing = false,
            Flag::Ending => state.ending = false,
        }
        self.inner.flag_cleared.notify_waiters();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn report(&self, context: &str, err: &SessionError) {
        tracing::warn!(context, kind = ?err.kind(), error = %err, "API request failed");
        self.emit(SessionEvent::ApiError {
            context: context.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn current_token(&self) -> Option<String> {
        self.lock().auth_token.clone().filter(|t| !t.is_empty())
    }

    fn is_current(&self, epoch: u64) -> bool {
        let state = self.lock();
        state.valid && state.epoch == epoch
    }

    async fn send(&self, path: &str, body: &impl Serialize) -> Result<TransportResponse> {
        let body = serde_json::to_value(body)?;
        let timeout = self.config.request_timeout();
        tokio::time::timeout(timeout, self.transport.post_json(path, &body))
            .await
            .map_err(|_| SessionError::Timeout {
                endpoint: path.to_string(),
                secs: timeout.as_secs(),
            })?
    }

    async fn request(&self, path: &str, body: &impl Serialize) -> Result<ApiResponse> {
        let reply = self.send(path, body).await?;
        expect_success(parse_api_response(path, &reply)?)
    }

    /// Sleep unless shutdown fires first; false on shutdown
    async fn sleep_or_shutdown(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Invalidate the session owned by `epoch`; false if it is already gone
    fn invalidate(&self, epoch: u64) -> bool {
        let heartbeat = {
            let mut state = self.lock();
            if !state.valid || state.epoch != epoch {
                return false;
            }
            state.valid = false;
            state.epoch += 1;
            self.emit(SessionEvent::StateChanged(false));
            state.heartbeat.take()
        };
        if let Some(heartbeat) = heartbeat {
            heartbeat.cancel.cancel();
        }
        true
    }

    fn mark_ended(&self) {
        let mut state = self.lock();
        if state.valid {
            state.valid = false;
            state.epoch += 1;
            self.emit(SessionEvent::StateChanged(false));
        }
    }
}

impl SessionManager {
    /// Create a manager over any transport
    pub fn new(config: ClientConfig, transport: Arc<dyn ApiTransport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        tracing::debug!(transport = transport.name(), "Session manager created");
        Self {
            inner: Arc::new(Inner {
                transport,
                config: Arc::new(config),
                state: Mutex::new(SessionState::default()),
                events,
                shutdown: CancellationToken::new(),
                shutdown_started: AtomicBool::new(false),
                flag_cleared: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Subscribe to state-change and error events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Events as a stream; lagged events are skipped
    pub fn event_stream(&self) -> impl Stream<Item = SessionEvent> {
        BroadcastStream::new(self.subscribe()).filter_map(|event| event.ok())
    }

    pub fn is_session_valid(&self) -> bool {
        self.inner.lock().valid
    }

    pub fn auth_token(&self) -> Option<String> {
        self.inner.lock().auth_token.clone()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        let state = self.inner.lock();
        if state.ending {
            SessionPhase::Ending
        } else if state.initializing {
            SessionPhase::Initializing
        } else if state.valid {
            SessionPhase::Active
        } else {
            SessionPhase::Idle
        }
    }

    /// Replace the auth token
    ///
    /// An active session is invalidated locally (its heartbeat stops); the
    /// server-side session is left to expire.
    pub fn set_auth_token(&self, token: impl Into<String>) {
        let heartbeat = {
            let mut state = self.inner.lock();
            state.auth_token = Some(token.into());
            if !state.valid {
                return;
            }
            state.valid = false;
            state.epoch += 1;
            self.inner.emit(SessionEvent::StateChanged(false));
            state.heartbeat.take()
        };

        if let Some(heartbeat) = heartbeat {
            heartbeat.cancel.cancel();
        }
        tracing::info!("Auth token replaced; active session invalidated");
    }

    /// Establish a session, retrying until it succeeds
    ///
    /// Returns the current validity without touching the network when a
    /// session is already initializing, ending or active. Fails only when
    /// no auth token is set. Returns `Ok(false)` if `shutdown()` interrupts
    /// the retry loop or the grace period.
    pub async fn init_session(&self) -> Result<bool> {
        {
            let mut state = self.inner.lock();
            if state.auth_token.as_deref().map_or(true, str::is_empty) {
                tracing::error!("Auth token is required to initiate a session");
                return Err(SessionError::Config("auth token is required".into()));
            }
            if state.initializing || state.ending || state.valid {
                tracing::debug!(valid = state.valid, "Session busy or valid, skipping initiation");
                return Ok(state.valid);
            }
            state.initializing = true;
        }

        let _guard = FlagGuard {
            inner: &self.inner,
            flag: Flag::Initializing,
        };
        self.initiate_until_active().await
    }

    async fn initiate_until_active(&self) -> Result<bool> {
        let retry = self.inner.config.init_retry();
        let grace = self.inner.config.validity_grace();

        loop {
            if self.inner.shutdown.is_cancelled() {
                return Ok(false);
            }
            let token = self
                .inner
                .current_token()
                .ok_or_else(|| SessionError::Config("auth token is required".into()))?;

            tracing::info!("Sending session initiation request");
            let body = SessionRequest { auth_token: &token };
            let result = tokio::select! {
                _ = self.inner.shutdown.cancelled() => return Ok(false),
                result = self.inner.request(INITIATE_PATH, &body) => result,
            };

            match result {
                Ok(_) => match self.activate(&token) {
                    Some(epoch) => {
                        tracing::info!("Game session initiated");
                        if !self.inner.sleep_or_shutdown(grace).await {
                            return Ok(false);
                        }
                        if self.inner.is_current(epoch) {
                            return Ok(true);
                        }
                        tracing::warn!("Session lost right after initiation");
                    }
                    None if self.inner.shutdown.is_cancelled() => return Ok(false),
                    None => {
                        tracing::info!("Auth token changed during initiation; retrying");
                        continue;
                    }
                },
                Err(e) => self.inner.report("initiate session", &e),
            }

            tracing::info!(retry_in_secs = retry.as_secs(), "Retrying session initiation");
            if !self.inner.sleep_or_shutdown(retry).await {
                return Ok(false);
            }
        }
    }

    /// Mark the session active and start its heartbeat
    ///
    /// Returns `None` when the token changed while the request was in
    /// flight or the manager is shutting down.
    fn activate(&self, token: &str) -> Option<u64> {
        let mut state = self.inner.lock();
        if state.auth_token.as_deref() != Some(token) || self.inner.shutdown.is_cancelled() {
            return None;
        }
        state.valid = true;
        state.epoch += 1;
        let epoch = state.epoch;
        self.inner.emit(SessionEvent::StateChanged(true));

        self.start_heartbeat(&mut state, token, epoch);
        Some(epoch)
    }

    /// Spawn the heartbeat for `epoch`, replacing any previous one
    fn start_heartbeat(&self, state: &mut SessionState, token: &str, epoch: u64) {
        if let Some(stale) = state.heartbeat.take() {
            stale.cancel.cancel();
        }
        let cancel = self.inner.shutdown.child_token();
        let task = tokio::spawn(
            self.clone()
                .heartbeat_loop(token.to_string(), cancel.clone(), epoch),
        );
        state.heartbeat = Some(Heartbeat { cancel, task });
    }

    async fn heartbeat_loop(self, token: String, cancel: CancellationToken, epoch: u64) {
        let interval = self.inner.config.heartbeat_interval();
        let body = SessionRequest { auth_token: &token };
        let mut first = true;

        loop {
            // The first beat goes out immediately to confirm the server recorded the session
            if !first {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            first = false;
            if cancel.is_cancelled() {
                break;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.inner.request(HEARTBEAT_PATH, &body) => result,
            };

            match result {
                Ok(_) => tracing::trace!("Heartbeat acknowledged"),
                Err(e) if e.is_no_active_session() => {
                    tracing::warn!("Server has no active session; scheduling re-initiation");
                    self.inner.report("heartbeat", &e);
                    if self.inner.invalidate(epoch) {
                        self.schedule_reinit();
                    }
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Heartbeat failed; session invalidated");
                    self.inner.report("heartbeat", &e);
                    self.inner.invalidate(epoch);
                    break;
                }
            }
        }
        tracing::debug!(epoch, "Heartbeat loop stopped");
    }

    fn schedule_reinit(&self) {
        let manager = self.clone();
        let delay = self.inner.config.reinit_delay();
        let task = async move {
            if !manager.inner.sleep_or_shutdown(delay).await {
                return;
            }
            if let Err(e) = manager.init_session().await {
                tracing::error!(error = %e, "Session re-initiation failed");
            }
        }
        .boxed();
        tokio::spawn(task);
    }

    /// End the session on the server
    ///
    /// Returns `true` when no session remains. Never retries; failures are
    /// reported through `SessionEvent::ApiError` and the session resumes
    /// its heartbeat.
    pub async fn end_session(&self) -> bool {
        let (token, epoch, heartbeat) = {
            let mut state = self.inner.lock();
            if state.ending || state.initializing || !state.valid {
                tracing::debug!("Session not active, skipping end request");
                return !state.valid;
            }
            let Some(token) = state.auth_token.clone() else {
                return !state.valid;
            };
            state.ending = true;
            (token, state.epoch, state.heartbeat.take())
        };
        let _guard = FlagGuard {
            inner: &self.inner,
            flag: Flag::Ending,
        };

        // Stop the heartbeat before the end request so it cannot revive the session
        if let Some(heartbeat) = heartbeat {
            heartbeat.cancel.cancel();
            if let Err(e) = heartbeat.task.await {
                tracing::warn!(error = %e, "Heartbeat task ended abnormally");
            }
        }

        let body = SessionRequest { auth_token: &token };
        match self.inner.request(END_PATH, &body).await {
            Ok(_) => {
                tracing::info!("Session ended");
                self.inner.mark_ended();
                true
            }
            Err(e) if e.is_no_active_session() => {
                tracing::info!("Server had no active session; treating as ended");
                self.inner.mark_ended();
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to end session");
                self.inner.report("end session", &e);
                self.resume_heartbeat(&token, epoch);
                false
            }
        }
    }

    /// Keep a session alive after its end request failed
    fn resume_heartbeat(&self, token: &str, epoch: u64) {
        let mut state = self.inner.lock();
        if !state.valid || state.epoch != epoch || self.inner.shutdown.is_cancelled() {
            return;
        }
        tracing::info!("Session still active; heartbeat resumed");
        self.start_heartbeat(&mut state, token, epoch);
    }

    /// Fetch an advertisement for the current session
    ///
    /// `None` without a valid session or on any failure.
    pub async fn get_advertisement(&self) -> Option<Advertisement> {
        let token = {
            let state = self.inner.lock();
            if !state.valid {
                tracing::debug!("Session is not valid; no advertisement requested");
                return None;
            }
            state.auth_token.clone()?
        };

        let body = AdvertisementRequest {
            game_uuid: &self.inner.config.game_uuid,
            auth_token: &token,
        };
        let result = async {
            let reply = self.inner.send(ADVERTISEMENT_PATH, &body).await?;
            let parsed: AdvertisementResponse = parse_payload(ADVERTISEMENT_PATH, &reply)?;
            parsed.ad.ok_or_else(|| {
                SessionError::InvalidResponse("no advertisement data found in response".into())
            })
        }
        .await;

        match result {
            Ok(ad) => {
                tracing::debug!(ad_id = ad.id, title = %ad.title, "Advertisement fetched");
                Some(ad)
            }
            Err(e) => {
                self.inner.report("fetch advertisement", &e);
                None
            }
        }
    }

    /// Shutdown hook; call once before the process exits and await it
    ///
    /// Stops any retry or re-initiation in progress, then ends the session.
    /// Later calls do nothing and report whether a session remains.
    pub async fn shutdown(&self) -> bool {
        if self.inner.shutdown_started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Shutdown already performed");
            return !self.is_session_valid();
        }
        tracing::info!("Shutting down session manager");
        self.inner.shutdown.cancel();

        // Let an in-progress initiation observe the cancellation and an
        // in-flight end request finish first
        loop {
            let done = self.inner.flag_cleared.notified();
            {
                let state = self.inner.lock();
                if !state.initializing && !state.ending {
                    break;
                }
            }
            done.await;
        }
        self.end_session().await
    }
}
