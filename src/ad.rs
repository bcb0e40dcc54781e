//! Timed advertisement display
//!
//! `AdPresenter` runs one ad at a time as a background task. Rendering is
//! the host's job: it watches `AdProgress` and draws whatever it likes.

use crate::error::{Result, SessionError};
use crate::session::SessionManager;
use crate::types::Advertisement;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Display state published while an ad runs
#[derive(Debug, Clone, PartialEq)]
pub enum AdProgress {
    /// Fetching the advertisement
    Loading,
    /// On screen; `progress` goes from 0.0 to 1.0
    Showing { ad: Advertisement, progress: f32 },
    /// Display over (completed, cancelled or failed)
    Finished,
}

/// How an ad display ended
#[derive(Debug, Clone, PartialEq)]
pub enum AdOutcome {
    Completed(Advertisement),
    Cancelled,
    Failed(String),
}

/// Shows advertisements fetched through the session manager
pub struct AdPresenter {
    session: SessionManager,
    tick: Duration,
    displaying: Arc<AtomicBool>,
}

struct DisplayGuard(Arc<AtomicBool>);

impl Drop for DisplayGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AdPresenter {
    pub fn new(session: SessionManager) -> Self {
        let tick = session.config().ad_tick();
        Self {
            session,
            tick,
            displaying: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_displaying(&self) -> bool {
        self.displaying.load(Ordering::SeqCst)
    }

    /// Fetch an ad and keep it on screen for `display_time`
    pub fn start(&self, display_time: Duration) -> Result<AdHandle> {
        if self.displaying.swap(true, Ordering::SeqCst) {
            tracing::warn!("An ad is already being displayed");
            return Err(SessionError::AdInProgress);
        }
        let guard = DisplayGuard(self.displaying.clone());

        let (progress_tx, progress_rx) = watch::channel(AdProgress::Loading);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_display(
            self.session.clone(),
            self.tick,
            display_time,
            progress_tx,
            cancel.clone(),
            guard,
        ));

        Ok(AdHandle {
            progress: progress_rx,
            cancel,
            task,
        })
    }
}

/// Handle to a running ad display
pub struct AdHandle {
    progress: watch::Receiver<AdProgress>,
    cancel: CancellationToken,
    task: JoinHandle<AdOutcome>,
}

impl AdHandle {
    /// Receiver for display progress
    pub fn progress(&self) -> watch::Receiver<AdProgress> {
        self.progress.clone()
    }

    /// Stop the display early
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the display to end
    pub async fn wait(self) -> AdOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => AdOutcome::Failed(format!("ad task failed: {}", e)),
        }
    }
}

async fn run_display(
    session: SessionManager,
    tick: Duration,
    display_time: Duration,
    progress: watch::Sender<AdProgress>,
    cancel: CancellationToken,
    _guard: DisplayGuard,
) -> AdOutcome {
    let fetched = tokio::select! {
        _ = cancel.cancelled() => None,
        ad = session.get_advertisement() => Some(ad),
    };
    let ad = match fetched {
        None => {
            progress.send_replace(AdProgress::Finished);
            return AdOutcome::Cancelled;
        }
        Some(None) => {
            tracing::warn!("No advertisement retrieved");
            progress.send_replace(AdProgress::Finished);
            return AdOutcome::Failed("no advertisement retrieved".into());
        }
        Some(Some(ad)) => ad,
    };

    tracing::info!(
        ad_id = ad.id,
        title = %ad.title,
        secs = display_time.as_secs_f32(),
        "Showing advertisement"
    );
    let started = Instant::now();

    loop {
        let elapsed = started.elapsed();
        let fraction = if display_time.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f32() / display_time.as_secs_f32()).min(1.0)
        };
        progress.send_replace(AdProgress::Showing {
            ad: ad.clone(),
            progress: fraction,
        });
        if elapsed >= display_time {
            break;
        }

        let wait = tick.min(display_time - elapsed);
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(ad_id = ad.id, "Advertisement stopped manually");
                progress.send_replace(AdProgress::Finished);
                return AdOutcome::Cancelled;
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }

    tracing::debug!(ad_id = ad.id, "Advertisement display time ended");
    progress.send_replace(AdProgress::Finished);
    AdOutcome::Completed(ad)
}
