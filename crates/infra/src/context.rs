//! Application context - dependency injection container

use std::sync::Arc;

use anyhow::Context as _;
use habitflow_common::auth::{
    Notifier, ProactiveRenewal, RefreshCoordinator, RenewalConfig, SessionEvents, SessionState,
    TokenCodec, TokenStore, TracingNotifier,
};
use habitflow_common::storage::{FileStore, KeyValueStore, MemoryStore};
use habitflow_domain::Config;
use tracing::info;

use crate::api::{HttpAuthClient, RequestGateway};
use crate::services::AuthService;

/// Holds the wired session core for the lifetime of the app
pub struct AppContext {
    pub config: Config,
    pub storage: Arc<dyn KeyValueStore>,
    pub session: Arc<SessionState>,
    pub events: SessionEvents,
    pub coordinator: Arc<RefreshCoordinator>,
    pub renewal: Arc<ProactiveRenewal>,
    pub gateway: Arc<RequestGateway>,
    pub auth: Arc<AuthService>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext").field("config", &self.config).finish_non_exhaustive()
    }
}

impl AppContext {
    /// Wire everything with notices sent to the log
    ///
    /// # Errors
    /// Fails if the storage file cannot be read or the HTTP clients cannot
    /// be built
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_notifier(config, Arc::new(TracingNotifier))
    }

    /// Wire everything, routing user notices to `notifier`
    ///
    /// The persisted session is restored, and renewal resumed, when called
    /// inside a tokio runtime.
    ///
    /// # Errors
    /// Fails if the storage file cannot be read or the HTTP clients cannot
    /// be built
    pub fn with_notifier(config: Config, notifier: Arc<dyn Notifier>) -> anyhow::Result<Self> {
        let storage: Arc<dyn KeyValueStore> = match &config.storage.path {
            Some(path) => Arc::new(FileStore::open(path).with_context(|| {
                format!("Failed to open session storage at {}", path.display())
            })?),
            None => Arc::new(MemoryStore::new()),
        };

        let session = Arc::new(SessionState::new(TokenStore::new(storage.clone())));
        let events = SessionEvents::new();
        let client = Arc::new(
            HttpAuthClient::new(&config.api).context("Failed to build the auth client")?,
        );
        let coordinator = Arc::new(RefreshCoordinator::new(
            session.clone(),
            client.clone(),
            events.clone(),
            notifier.clone(),
        ));
        let codec = TokenCodec::new();
        let renewal = ProactiveRenewal::new(
            session.clone(),
            coordinator.clone(),
            codec.clone(),
            RenewalConfig::from(&config.session),
            events.clone(),
        );
        let gateway = Arc::new(
            RequestGateway::new(&config.api, session.clone(), coordinator.clone(), notifier)
                .context("Failed to build the request gateway")?,
        );
        let auth = Arc::new(AuthService::new(
            session.clone(),
            client,
            gateway.clone(),
            renewal.clone(),
            events.clone(),
            codec,
        ));

        let restored = auth.restore_session();
        info!(api = %config.api.base_url, restored, "Application context ready");

        Ok(Self { config, storage, session, events, coordinator, renewal, gateway, auth })
    }
}
