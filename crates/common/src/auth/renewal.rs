//! Proactive access token renewal
//!
//! Schedules one refresh shortly before the current access token expires so
//! that most requests never see a 401. The timer is one-shot: a successful
//! renewal schedules the next one from the new token's expiry, a failed
//! renewal leaves the session to the reactive path in the gateway.
//!
//! Refreshes started elsewhere (a 401 in the gateway) are picked up from
//! [`SessionEvent::Refreshed`] and reschedule the timer as well, as long as
//! renewal has not been stopped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use habitflow_domain::SessionConfig;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::TokenCodec;
use super::coordinator::RefreshCoordinator;
use super::events::{SessionEvent, SessionEvents};
use super::session::SessionState;

/// Timer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalConfig {
    /// How long before expiry the timer should fire
    pub renew_before_expiry: Duration,
    /// Lower bound on the timer delay
    pub minimum_delay: Duration,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for RenewalConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            renew_before_expiry: config.renew_before_expiry(),
            minimum_delay: config.minimum_renewal_delay(),
        }
    }
}

struct Scheduled {
    generation: u64,
    cancel: CancellationToken,
}

/// One-shot renewal timer driven by the access token's expiry
pub struct ProactiveRenewal {
    session: Arc<SessionState>,
    coordinator: Arc<RefreshCoordinator>,
    codec: TokenCodec,
    config: RenewalConfig,
    events: SessionEvents,
    scheduled: Mutex<Option<Scheduled>>,
    generation: AtomicU64,
    /// Between `start()` and `stop()`
    active: AtomicBool,
    following: AtomicBool,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for ProactiveRenewal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProactiveRenewal")
            .field("config", &self.config)
            .field("scheduled", &self.is_scheduled())
            .finish_non_exhaustive()
    }
}

impl ProactiveRenewal {
    #[must_use]
    pub fn new(
        session: Arc<SessionState>,
        coordinator: Arc<RefreshCoordinator>,
        codec: TokenCodec,
        config: RenewalConfig,
        events: SessionEvents,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            coordinator,
            codec,
            config,
            events,
            scheduled: Mutex::new(None),
            generation: AtomicU64::new(0),
            active: AtomicBool::new(false),
            following: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    /// (Re)schedule renewal for the current access token
    ///
    /// Any pending timer is cancelled first. Nothing is scheduled when the
    /// session has no access token, or no refresh token to renew it with.
    /// Until [`stop`](Self::stop), every successful refresh reschedules from
    /// the new token, whoever started it.
    /// Must be called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No Tokio runtime, renewal not scheduled");
            return;
        };
        self.cancel_pending();
        self.active.store(true, Ordering::Release);
        self.follow_refreshes(&runtime);

        let Some(access_token) = self.session.current_access_token() else {
            debug!("No access token, renewal not scheduled");
            return;
        };
        if self.session.current_refresh_token().is_none() {
            debug!("Session has no refresh token, renewal not scheduled");
            return;
        }

        let delay = self.delay_for(&access_token);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        if let Some(previous) =
            self.scheduled.lock().replace(Scheduled { generation, cancel: cancel.clone() })
        {
            previous.cancel.cancel();
        }

        info!(delay_secs = delay.as_secs(), "Access token renewal scheduled");

        let this = Arc::downgrade(self);
        runtime.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Renewal timer cancelled");
                }
                () = tokio::time::sleep(delay) => {
                    Self::fire(this, generation).await;
                }
            }
        });
    }

    /// Cancel the pending timer, if any, and stop following refreshes
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
        self.cancel_pending();
    }

    /// Whether a timer is pending or its renewal is in progress
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.lock().is_some()
    }

    /// Delay before renewing `access_token`
    ///
    /// `max(minimum_delay, time_until_expiration - renew_before_expiry)`
    #[must_use]
    pub fn delay_for(&self, access_token: &str) -> Duration {
        self.codec
            .time_until_expiration(access_token)
            .saturating_sub(self.config.renew_before_expiry)
            .max(self.config.minimum_delay)
    }

    fn cancel_pending(&self) {
        if let Some(scheduled) = self.scheduled.lock().take() {
            scheduled.cancel.cancel();
            debug!("Renewal timer cancelled");
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Spawn the listener that reschedules after refreshes driven by others
    fn follow_refreshes(self: &Arc<Self>, runtime: &Handle) {
        if self.following.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut events = self.events.subscribe();
        let shutdown = self.shutdown.clone();
        let this = Arc::downgrade(self);

        runtime.spawn(async move {
            loop {
                let event = tokio::select! {
                    () = shutdown.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(SessionEvent::Refreshed) => {}
                    Ok(_) => continue,
                    // A missed event may have been a refresh
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Renewal listener lagged behind session events");
                    }
                    Err(RecvError::Closed) => break,
                }
                let Some(this) = this.upgrade() else {
                    break;
                };
                if this.is_active() {
                    debug!("Access token refreshed, rescheduling renewal");
                    this.start();
                }
            }
        });
    }

    async fn fire(this: Weak<Self>, generation: u64) {
        let Some(this) = this.upgrade() else {
            return;
        };

        let renewable = this
            .session
            .current_access_token()
            .is_some_and(|token| !this.codec.is_expired(&token, 0));
        if !renewable {
            debug!("Access token gone or already expired, skipping renewal");
            this.release(generation);
            return;
        }

        info!("Renewing access token ahead of expiry");
        match this.coordinator.request_refresh().await {
            Ok(_) if !this.is_active() => {
                debug!("Renewal stopped while refreshing, not rescheduling");
            }
            Ok(_) => this.start(),
            Err(e) => {
                warn!(error = %e, "Proactive renewal failed, not rescheduling");
                this.release(generation);
            }
        }
    }

    /// Forget the schedule that just finished, unless it was replaced
    fn release(&self, generation: u64) {
        let mut scheduled = self.scheduled.lock();
        if scheduled.as_ref().is_some_and(|s| s.generation == generation) {
            *scheduled = None;
        }
    }
}

impl Drop for ProactiveRenewal {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(scheduled) = self.scheduled.get_mut().take() {
            scheduled.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::auth::events::SessionEvents;
    use crate::auth::store::TokenStore;
    use crate::auth::traits::AuthClientError;
    use crate::auth::types::RefreshedTokens;
    use crate::storage::MemoryStore;
    use crate::testing::{jwt_expiring_at, MockAuthClient, MockClock, RecordingNotifier};

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        clock: MockClock,
        session: Arc<SessionState>,
        client: Arc<MockAuthClient>,
        coordinator: Arc<RefreshCoordinator>,
        renewal: Arc<ProactiveRenewal>,
    }

    fn fixture(client: MockAuthClient) -> Fixture {
        let clock = MockClock::at(Utc.timestamp_opt(NOW, 0).unwrap());
        let codec = TokenCodec::with_clock(Arc::new(clock.clone()));
        let session = Arc::new(SessionState::new(TokenStore::new(Arc::new(MemoryStore::new()))));
        let client = Arc::new(client);
        let events = SessionEvents::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            session.clone(),
            client.clone(),
            events.clone(),
            Arc::new(RecordingNotifier::new()),
        ));
        let renewal = ProactiveRenewal::new(
            session.clone(),
            coordinator.clone(),
            codec,
            RenewalConfig::default(),
            events,
        );
        Fixture { clock, session, client, coordinator, renewal }
    }

    fn renewed() -> MockAuthClient {
        let tokens = RefreshedTokens::new(jwt_expiring_at(NOW + 3600));
        MockAuthClient::new().with_refresh_result(Ok(tokens))
    }

    #[test]
    fn test_delay_respects_lead_and_floor() {
        let f = fixture(MockAuthClient::new());

        assert_eq!(f.renewal.delay_for(&jwt_expiring_at(NOW + 120)), Duration::from_secs(60));
        assert_eq!(f.renewal.delay_for(&jwt_expiring_at(NOW + 65)), Duration::from_secs(10));
        assert_eq!(f.renewal.delay_for(&jwt_expiring_at(NOW - 5)), Duration::from_secs(10));
        assert_eq!(f.renewal.delay_for("garbage"), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_start_without_session_schedules_nothing() {
        let f = fixture(MockAuthClient::new());
        f.renewal.start();
        assert!(!f.renewal.is_scheduled());
    }

    #[tokio::test]
    async fn test_legacy_session_is_not_renewed() {
        let f = fixture(MockAuthClient::new());
        f.session.set_session(jwt_expiring_at(NOW + 120), None, None);

        f.renewal.start();
        assert!(!f.renewal.is_scheduled());
    }

    /// Validates that the timer fires at `exp - lead`, renews once, and
    /// reschedules from the new token.
    #[tokio::test(start_paused = true)]
    async fn test_renews_before_expiry_and_reschedules() {
        let f = fixture(renewed());
        f.session.set_session(jwt_expiring_at(NOW + 120), Some("r".into()), None);

        f.renewal.start();
        assert!(f.renewal.is_scheduled());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(f.client.refresh_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.client.refresh_count(), 1);
        assert_eq!(f.session.current_access_token(), Some(jwt_expiring_at(NOW + 3600)));
        assert!(f.renewal.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_reschedule() {
        let f = fixture(MockAuthClient::new().with_refresh_result(Err(AuthClientError::Rejected {
            status: 401,
            message: "revoked".into(),
        })));
        f.session.set_session(jwt_expiring_at(NOW + 120), Some("r".into()), None);

        f.renewal.start();
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(f.client.refresh_count(), 1);
        assert!(!f.renewal.is_scheduled());
        assert!(!f.session.is_authenticated());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(f.client.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_and_is_idempotent() {
        let f = fixture(renewed());
        f.session.set_session(jwt_expiring_at(NOW + 120), Some("r".into()), None);

        f.renewal.start();
        f.renewal.stop();
        f.renewal.stop();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(f.client.refresh_count(), 0);
        assert!(!f.renewal.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_pending_timer() {
        let f = fixture(renewed());
        f.session.set_session(jwt_expiring_at(NOW + 120), Some("r".into()), None);

        f.renewal.start();
        f.renewal.start();
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(f.client.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let f = fixture(renewed());
        f.session.set_session(jwt_expiring_at(NOW + 120), Some("r".into()), None);

        f.renewal.start();
        drop(f.renewal);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(f.client.refresh_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_is_left_to_reactive_path() {
        let f = fixture(renewed());
        f.session.set_session(jwt_expiring_at(NOW + 120), Some("r".into()), None);

        f.renewal.start();
        f.clock.advance(chrono::Duration::seconds(300));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(f.client.refresh_count(), 0);
        assert!(!f.renewal.is_scheduled());
        assert!(f.session.is_authenticated());
    }

    /// Validates that a refresh driven by a 401 rearms a timer that had
    /// already fired and skipped an expired token.
    ///
    /// # Test Steps
    /// 1. Let the timer fire after the wall clock passed expiry
    /// 2. Refresh through the coordinator, as the gateway would
    /// 3. Verify the timer is rescheduled from the new token and renews it
    #[tokio::test(start_paused = true)]
    async fn test_reactive_refresh_reschedules_renewal() {
        let f = fixture(renewed());
        f.session.set_session(jwt_expiring_at(NOW + 120), Some("r".into()), None);

        f.renewal.start();
        f.clock.advance(chrono::Duration::seconds(300));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!f.renewal.is_scheduled());

        f.coordinator.request_refresh().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(f.renewal.is_scheduled());

        // New token expires at NOW + 3600, the wall clock reads NOW + 300
        tokio::time::sleep(Duration::from_secs(3241)).await;
        assert_eq!(f.client.refresh_count(), 2);

        f.renewal.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_renewal_ignores_reactive_refresh() {
        let f = fixture(renewed());
        f.session.set_session(jwt_expiring_at(NOW + 120), Some("r".into()), None);

        f.renewal.start();
        f.renewal.stop();
        f.coordinator.request_refresh().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(!f.renewal.is_scheduled());
    }
}
