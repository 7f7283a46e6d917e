use std::net::TcpListener;
use std::sync::Arc;

use habitflow_common::auth::{
    ProactiveRenewal, RefreshCoordinator, RenewalConfig, SessionEvents, SessionState, TokenCodec,
    TokenStore,
};
use habitflow_common::storage::MemoryStore;
use habitflow_common::testing::RecordingNotifier;
use habitflow_domain::ApiConfig;
use habitflow_infra::{AuthService, HttpAuthClient, RequestGateway};
use wiremock::MockServer;

/// The session core wired against a WireMock auth server, with an in-memory
/// store and a notifier that records what the user would have seen.
pub struct TestApp {
    pub server: MockServer,
    pub storage: Arc<MemoryStore>,
    pub session: Arc<SessionState>,
    pub events: SessionEvents,
    pub notifier: Arc<RecordingNotifier>,
    pub coordinator: Arc<RefreshCoordinator>,
    pub renewal: Arc<ProactiveRenewal>,
    pub gateway: Arc<RequestGateway>,
    pub auth: AuthService,
}

impl TestApp {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self::with_base_url(server, &base_url)
    }

    /// Same as [`TestApp::start`] with custom renewal timing
    pub async fn start_with_renewal(renewal: RenewalConfig) -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self::build(server, &base_url, renewal)
    }

    /// Point the gateway and auth client at `base_url` instead of the mock
    pub fn with_base_url(server: MockServer, base_url: &str) -> Self {
        Self::build(server, base_url, RenewalConfig::default())
    }

    fn build(server: MockServer, base_url: &str, renewal_config: RenewalConfig) -> Self {
        let config = ApiConfig { base_url: base_url.to_string(), timeout_secs: 5 };
        let storage = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionState::new(TokenStore::new(storage.clone())));
        let events = SessionEvents::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let client = Arc::new(HttpAuthClient::new(&config).expect("auth client should build"));
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
            renewal_config,
            events.clone(),
        );
        let gateway = Arc::new(
            RequestGateway::new(&config, session.clone(), coordinator.clone(), notifier.clone())
                .expect("gateway should build"),
        );
        let auth = AuthService::new(
            session.clone(),
            client,
            gateway.clone(),
            renewal.clone(),
            events.clone(),
            codec,
        );

        Self { server, storage, session, events, notifier, coordinator, renewal, gateway, auth }
    }
}

/// A local address nothing listens on
pub fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr should be available");
    drop(listener);
    format!("http://{addr}")
}
