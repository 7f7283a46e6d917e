//! Single-flight access token refresh
//!
//! Any number of callers may discover at the same moment that the access
//! token was rejected. [`RefreshCoordinator::request_refresh`] guarantees
//! that only one refresh call reaches the server; everyone else waits on
//! that call and receives the same outcome.
//!
//! ```text
//!   Idle ──request_refresh()──► Refreshing { waiters }
//!    ▲                              │
//!    └──── success / failure ◄──────┘  (every waiter resolved once)
//! ```
//!
//! The state lives behind a synchronous mutex that is only held to inspect
//! or swap the state, never across the network call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use habitflow_domain::constants::SESSION_EXPIRED_MESSAGE;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::events::{SessionEvent, SessionEvents};
use super::notifier::{Notice, Notifier};
use super::session::SessionState;
use super::traits::{AuthClientError, AuthClientTrait};

/// Outcome shared with every caller of one refresh
pub type RefreshOutcome = Result<String, RefreshError>;

/// Why a refresh produced no access token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Refresh token rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Refresh request failed: {0}")]
    Network(String),

    #[error("Refresh response invalid: {0}")]
    InvalidResponse(String),

    /// The session was logged out or replaced while the call was in flight
    #[error("Session changed during refresh")]
    Superseded,

    /// The task driving the refresh was cancelled before it settled
    #[error("Refresh abandoned before completing")]
    Abandoned,
}

impl From<AuthClientError> for RefreshError {
    fn from(err: AuthClientError) -> Self {
        match err {
            AuthClientError::Rejected { status, message } => Self::Rejected { status, message },
            AuthClientError::Network(msg) => Self::Network(msg),
            AuthClientError::ParseError(msg) | AuthClientError::ConfigError(msg) => {
                Self::InvalidResponse(msg)
            }
        }
    }
}

enum RefreshState {
    Idle,
    Refreshing { waiters: Vec<oneshot::Sender<RefreshOutcome>> },
}

enum Role {
    Leader(String),
    Follower(oneshot::Receiver<RefreshOutcome>),
    NoToken,
}

/// Collapses concurrent refresh requests into one server call
pub struct RefreshCoordinator {
    session: Arc<SessionState>,
    client: Arc<dyn AuthClientTrait>,
    events: SessionEvents,
    notifier: Arc<dyn Notifier>,
    state: Mutex<RefreshState>,
    refresh_calls: AtomicU64,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("refresh_calls", &self.refresh_calls())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(
        session: Arc<SessionState>,
        client: Arc<dyn AuthClientTrait>,
        events: SessionEvents,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            client,
            events,
            notifier,
            state: Mutex::new(RefreshState::Idle),
            refresh_calls: AtomicU64::new(0),
        }
    }

    /// Obtain a fresh access token
    ///
    /// Joins the refresh already in flight if there is one, otherwise starts
    /// it. On success the session holds the new token before this returns.
    /// On failure the session has been cleared and
    /// [`SessionEvent::Expired`] emitted.
    ///
    /// # Errors
    /// Returns [`RefreshError::NoRefreshToken`] without any server call when
    /// the session holds no refresh token; otherwise the error of the shared
    /// refresh call
    pub async fn request_refresh(&self) -> RefreshOutcome {
        let role = {
            let mut state = self.state.lock();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Role::Follower(rx)
                }
                RefreshState::Idle => match self.session.current_refresh_token() {
                    Some(token) => {
                        *state = RefreshState::Refreshing { waiters: Vec::new() };
                        Role::Leader(token)
                    }
                    None => Role::NoToken,
                },
            }
        };

        match role {
            Role::Leader(refresh_token) => self.lead(refresh_token).await,
            Role::Follower(rx) => {
                debug!("Refresh already in flight, waiting on it");
                rx.await.unwrap_or(Err(RefreshError::Abandoned))
            }
            Role::NoToken => {
                warn!("Access token rejected and no refresh token is held");
                let err = RefreshError::NoRefreshToken;
                self.expire_session(&err);
                Err(err)
            }
        }
    }

    /// Whether a refresh call is currently in flight
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of refresh calls sent to the server since construction
    #[must_use]
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::Relaxed)
    }

    async fn lead(&self, refresh_token: String) -> RefreshOutcome {
        let mut guard = InFlight { coordinator: self, settled: false };
        self.session.set_loading(true);
        self.refresh_calls.fetch_add(1, Ordering::Relaxed);
        debug!("Refreshing access token");

        let result = self.client.refresh(&refresh_token).await;

        // Apply the outcome to the session while still Refreshing, so a
        // caller arriving now queues on this result instead of starting over
        let still_current =
            self.session.current_refresh_token().as_deref() == Some(refresh_token.as_str());
        let outcome = match result {
            _ if !still_current => {
                info!("Session changed during refresh, discarding result");
                Err(RefreshError::Superseded)
            }
            Ok(tokens) => {
                self.session.update_access_token(tokens.access_token.clone());
                if let Some(rotated) = tokens.refresh_token {
                    self.session.update_refresh_token(rotated);
                }
                self.events.emit(SessionEvent::Refreshed);
                info!("Access token refreshed");
                Ok(tokens.access_token)
            }
            Err(e) => {
                let err = RefreshError::from(e);
                error!(error = %err, "Token refresh failed");
                self.expire_session(&err);
                Err(err)
            }
        };

        guard.settled = true;
        let waiters = self.settle();
        debug!(waiters = waiters.len(), "Releasing refresh waiters");
        for waiter in waiters {
            // A waiter whose caller went away is fine to skip
            let _ = waiter.send(outcome.clone());
        }
        outcome
    }

    /// Return to Idle and hand back the queued waiters
    fn settle(&self) -> Vec<oneshot::Sender<RefreshOutcome>> {
        let previous = std::mem::replace(&mut *self.state.lock(), RefreshState::Idle);
        self.session.set_loading(false);
        match previous {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        }
    }

    fn expire_session(&self, error: &RefreshError) {
        let had_credentials = self.session.snapshot().has_credentials();
        self.session.clear();
        if had_credentials {
            info!(reason = %error, "Session expired");
            self.events.emit(SessionEvent::Expired { reason: error.to_string() });
            self.notifier.notify(Notice::warning(SESSION_EXPIRED_MESSAGE));
        }
    }
}

/// Resets the coordinator if the leading future is dropped mid-call
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let waiters = self.coordinator.settle();
        warn!(waiters = waiters.len(), "Refresh abandoned mid-flight");
        for waiter in waiters {
            let _ = waiter.send(Err(RefreshError::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::join_all;

    use super::*;
    use crate::auth::store::TokenStore;
    use crate::auth::types::RefreshedTokens;
    use crate::storage::MemoryStore;
    use crate::testing::{MockAuthClient, RecordingNotifier};

    struct Fixture {
        session: Arc<SessionState>,
        client: Arc<MockAuthClient>,
        notifier: Arc<RecordingNotifier>,
        events: SessionEvents,
        coordinator: Arc<RefreshCoordinator>,
    }

    fn fixture(client: MockAuthClient) -> Fixture {
        let session = Arc::new(SessionState::new(TokenStore::new(Arc::new(MemoryStore::new()))));
        let client = Arc::new(client);
        let notifier = Arc::new(RecordingNotifier::new());
        let events = SessionEvents::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            session.clone(),
            client.clone(),
            events.clone(),
            notifier.clone(),
        ));
        Fixture { session, client, notifier, events, coordinator }
    }

    /// Validates that concurrent callers share one server call and one
    /// token.
    #[tokio::test]
    async fn test_concurrent_requests_share_one_call() {
        let f = fixture(
            MockAuthClient::new()
                .with_refresh_result(Ok(RefreshedTokens::new("fresh")))
                .with_refresh_delay(Duration::from_millis(20)),
        );
        f.session.set_session("stale".into(), Some("r1".into()), None);

        let results = join_all((0..8).map(|_| f.coordinator.request_refresh())).await;

        assert_eq!(f.client.refresh_count(), 1);
        assert_eq!(f.coordinator.refresh_calls(), 1);
        for result in results {
            assert_eq!(result.unwrap(), "fresh");
        }
        assert_eq!(f.session.current_access_token().as_deref(), Some("fresh"));
        assert!(!f.coordinator.is_refreshing());
        assert!(!f.session.is_loading());
    }

    #[tokio::test]
    async fn test_concurrent_requests_from_spawned_tasks() {
        let f = fixture(
            MockAuthClient::new()
                .with_refresh_result(Ok(RefreshedTokens::new("fresh")))
                .with_refresh_delay(Duration::from_millis(50)),
        );
        f.session.set_session("stale".into(), Some("r1".into()), None);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = f.coordinator.clone();
                tokio::spawn(async move { coordinator.request_refresh().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "fresh");
        }
        assert_eq!(f.client.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_stored() {
        let f = fixture(
            MockAuthClient::new()
                .with_refresh_result(Ok(RefreshedTokens::new("a2").with_refresh_token("r2"))),
        );
        f.session.set_session("a1".into(), Some("r1".into()), None);
        let mut events = f.events.subscribe();

        f.coordinator.request_refresh().await.unwrap();

        assert_eq!(f.client.last_refresh_token().as_deref(), Some("r1"));
        assert_eq!(f.session.current_refresh_token().as_deref(), Some("r2"));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);
    }

    /// Validates that every waiter sees the same failure and the session is
    /// cleared exactly once.
    #[tokio::test]
    async fn test_failure_rejects_all_and_expires_session() {
        let f = fixture(
            MockAuthClient::new()
                .with_refresh_result(Err(AuthClientError::Rejected {
                    status: 401,
                    message: "revoked".into(),
                }))
                .with_refresh_delay(Duration::from_millis(20)),
        );
        f.session.set_session("a".into(), Some("r".into()), None);
        let mut events = f.events.subscribe();

        let results = join_all((0..3).map(|_| f.coordinator.request_refresh())).await;

        let expected = RefreshError::Rejected { status: 401, message: "revoked".into() };
        for result in results {
            assert_eq!(result.unwrap_err(), expected);
        }
        assert_eq!(f.client.refresh_count(), 1);
        assert!(!f.session.is_authenticated());
        assert!(f.session.current_refresh_token().is_none());
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::Expired { .. }));
        assert!(events.try_recv().is_err());
        assert_eq!(f.notifier.messages(), vec![SESSION_EXPIRED_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_makes_no_call() {
        let f = fixture(MockAuthClient::new());
        f.session.set_session("legacy".into(), None, None);

        let err = f.coordinator.request_refresh().await.unwrap_err();

        assert_eq!(err, RefreshError::NoRefreshToken);
        assert_eq!(f.client.refresh_count(), 0);
        assert!(!f.session.is_authenticated());
        assert_eq!(f.notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_missing_session_is_quiet() {
        let f = fixture(MockAuthClient::new());

        assert_eq!(f.coordinator.request_refresh().await, Err(RefreshError::NoRefreshToken));
        assert_eq!(f.notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_network_failure_maps_to_network_error() {
        let f = fixture(
            MockAuthClient::new()
                .with_refresh_result(Err(AuthClientError::Network("connection refused".into()))),
        );
        f.session.set_session("a".into(), Some("r".into()), None);

        assert_eq!(
            f.coordinator.request_refresh().await,
            Err(RefreshError::Network("connection refused".into()))
        );
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_call_server() {
        let f = fixture(MockAuthClient::new().with_refresh_result(Ok(RefreshedTokens::new("n"))));
        f.session.set_session("a".into(), Some("r".into()), None);

        f.coordinator.request_refresh().await.unwrap();
        f.coordinator.request_refresh().await.unwrap();

        assert_eq!(f.client.refresh_count(), 2);
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_waiters() {
        let f = fixture(
            MockAuthClient::new()
                .with_refresh_result(Ok(RefreshedTokens::new("late")))
                .with_refresh_delay(Duration::from_secs(60)),
        );
        f.session.set_session("a".into(), Some("r".into()), None);

        let leader = tokio::spawn({
            let coordinator = f.coordinator.clone();
            async move { coordinator.request_refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(f.coordinator.is_refreshing());

        let follower = tokio::spawn({
            let coordinator = f.coordinator.clone();
            async move { coordinator.request_refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        leader.abort();
        assert_eq!(follower.await.unwrap(), Err(RefreshError::Abandoned));
        assert!(!f.coordinator.is_refreshing());
        // Session untouched by an abandoned refresh
        assert_eq!(f.session.current_access_token().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_logout_during_refresh_discards_result() {
        let f = fixture(
            MockAuthClient::new()
                .with_refresh_result(Ok(RefreshedTokens::new("zombie")))
                .with_refresh_delay(Duration::from_millis(30)),
        );
        f.session.set_session("a".into(), Some("r".into()), None);

        let pending = tokio::spawn({
            let coordinator = f.coordinator.clone();
            async move { coordinator.request_refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        f.session.clear();

        assert_eq!(pending.await.unwrap(), Err(RefreshError::Superseded));
        assert!(!f.session.is_authenticated());
        assert_eq!(f.notifier.count(), 0);
    }
}
