//! High-level client wiring config, transport, session, auth and ads
//!
//! Hosts call `Playmanity::init` once at startup and `shutdown().await`
//! once before the process exits.

use crate::ad::AdPresenter;
use crate::auth::DeviceAuthorization;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::session::SessionManager;
use crate::transport::http::HttpTransport;
use crate::transport::ApiTransport;
use crate::types::{Advertisement, PendingAuthorization};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Playmanity {
    session: SessionManager,
    auth: DeviceAuthorization,
    ads: AdPresenter,
}

impl Playmanity {
    /// Startup hook: validate config and connect over HTTP
    pub fn init(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        tracing::info!(server = %transport.base_url(), "Playmanity client initialized");
        Ok(Self::with_transport(config, transport))
    }

    /// Build over a custom transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn ApiTransport>) -> Self {
        let session = SessionManager::new(config, transport.clone());
        let auth = DeviceAuthorization::new(Arc::new(session.config().clone()), transport);
        let ads = AdPresenter::new(session.clone());
        Self { session, auth, ads }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn ads(&self) -> &AdPresenter {
        &self.ads
    }

    pub fn device_authorization(&self) -> &DeviceAuthorization {
        &self.auth
    }

    /// Authorize this device, store the token and establish a session
    ///
    /// `on_pending` receives the authorization URL to show the player.
    pub async fn authenticate<F>(
        &self,
        device_id: &str,
        cancel: &CancellationToken,
        on_pending: F,
    ) -> Result<bool>
    where
        F: FnOnce(&PendingAuthorization),
    {
        let pending = self.auth.initiate(device_id).await?;
        on_pending(&pending);

        let token = self.auth.wait_for_token(&pending, cancel).await?;
        self.session.set_auth_token(token);
        self.session.init_session().await
    }

    /// Shorthand for `session().get_advertisement()`
    pub async fn advertisement(&self) -> Option<Advertisement> {
        self.session.get_advertisement().await
    }

    /// Shutdown hook: end the session before exit
    pub async fn shutdown(&self) -> bool {
        self.session.shutdown().await
    }
}
