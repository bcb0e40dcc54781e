//! # playmanity-session
//!
//! Session lifecycle, device authorization, and advertisement client for
//! the Playmanity game backend.
//!
//! ## Overview
//!
//! The core is [`SessionManager`]: it owns exactly one backend session,
//! keeps it alive with a heartbeat, re-initiates it when the server loses
//! it, and ends it on shutdown. Networking goes through the
//! [`ApiTransport`] trait so the game engine (or a test) decides how
//! requests are actually sent.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use playmanity_session::{ClientConfig, Playmanity};
//!
//! # async fn example() -> playmanity_session::Result<()> {
//! let client = Playmanity::init(ClientConfig::new(
//!     "https://app.playmanity.net/api",
//!     "404e1b2b-de1b-4988-8cc8-94239dc482b3",
//! ))?;
//!
//! client.session().set_auth_token("jwt-from-login");
//! client.session().init_session().await?;
//!
//! if let Some(ad) = client.advertisement().await {
//!     println!("Showing {}", ad.title);
//! }
//!
//! // Before the process exits
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! - **http**: reqwest client with a per-request timeout
//! - **memory**: scripted replies and call recording for tests
//!
//! ## Architecture
//!
//! - **ApiTransport** trait: boundary to the network
//! - **SessionManager**: init / heartbeat / end state machine with events
//! - **DeviceAuthorization**: obtains the auth token the session needs
//! - **AdPresenter**: cancellable timed ad display with progress reporting
//! - **Playmanity**: facade with the startup / shutdown hooks

pub mod ad;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod response;
pub mod session;
pub mod transport;
pub mod types;

// Re-export core types
pub use ad::{AdHandle, AdOutcome, AdPresenter, AdProgress};
pub use auth::DeviceAuthorization;
pub use client::Playmanity;
pub use config::ClientConfig;
pub use error::{ErrorKind, Result, SessionError, NO_ACTIVE_SESSION};
pub use session::SessionManager;
pub use transport::{ApiTransport, TransportResponse};
pub use types::{
    AdKind, Advertisement, ApiErrorBody, ApiResponse, AuthStatus, PendingAuthorization,
    SessionEvent, SessionPhase,
};

// Re-export transports for convenience
pub use transport::http::HttpTransport;
pub use transport::memory::{MemoryTransport, Scripted};
