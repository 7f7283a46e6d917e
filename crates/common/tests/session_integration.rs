//! Integration tests for the session core
//!
//! Exercises storage, session state, refresh coordination and renewal
//! together over a real file-backed store.

#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use habitflow_common::auth::{
    AuthClientError, ProactiveRenewal, RefreshCoordinator, RefreshError, RefreshedTokens,
    RenewalConfig, SessionEvent, SessionEvents, SessionState, TokenCodec, TokenStore,
};
use habitflow_common::storage::{FileStore, KeyValueStore};
use habitflow_common::testing::{
    jwt_expiring_at, sample_user, MockAuthClient, MockClock, RecordingNotifier,
};
use habitflow_common::time::Clock;
use habitflow_domain::constants::{LANGUAGE_KEY, THEME_KEY};

struct Harness {
    storage: Arc<FileStore>,
    session: Arc<SessionState>,
    client: Arc<MockAuthClient>,
    events: SessionEvents,
    notifier: Arc<RecordingNotifier>,
    coordinator: Arc<RefreshCoordinator>,
}

fn harness(path: &std::path::Path, client: MockAuthClient) -> Harness {
    let storage = Arc::new(FileStore::open(path).unwrap());
    let session = Arc::new(SessionState::new(TokenStore::new(storage.clone())));
    let client = Arc::new(client);
    let events = SessionEvents::new();
    let notifier = Arc::new(RecordingNotifier::new());
    let coordinator = Arc::new(RefreshCoordinator::new(
        session.clone(),
        client.clone(),
        events.clone(),
        notifier.clone(),
    ));
    Harness { storage, session, client, events, notifier, coordinator }
}

/// Validates that a session written by one process is restored by the next.
///
/// # Test Steps
/// 1. Install a session over a file store
/// 2. Reopen the file in a fresh `SessionState`
/// 3. Verify all three fields come back after `initialize`
#[test]
fn test_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitflow.json");

    let first = harness(&path, MockAuthClient::new());
    first.session.set_session("a1".into(), Some("r1".into()), Some(sample_user()));
    drop(first);

    let second = harness(&path, MockAuthClient::new());
    assert!(second.session.initialize());
    assert_eq!(second.session.current_access_token().as_deref(), Some("a1"));
    assert_eq!(second.session.current_refresh_token().as_deref(), Some("r1"));
    assert_eq!(second.session.current_user(), Some(sample_user()));
}

/// Validates that a burst of 401 handlers produces one refresh and that the
/// refreshed token is what the next process start sees.
#[tokio::test]
async fn test_refresh_burst_persists_single_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitflow.json");
    let h = harness(
        &path,
        MockAuthClient::new()
            .with_refresh_result(Ok(RefreshedTokens::new("a2").with_refresh_token("r2")))
            .with_refresh_delay(Duration::from_millis(25)),
    );
    h.session.set_session("a1".into(), Some("r1".into()), None);
    let mut events = h.events.subscribe();

    let results = join_all((0..16).map(|_| h.coordinator.request_refresh())).await;

    assert!(results.iter().all(|r| r.as_deref() == Ok("a2")));
    assert_eq!(h.client.refresh_count(), 1);
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);

    let restarted =
        SessionState::new(TokenStore::new(Arc::new(FileStore::open(&path).unwrap())));
    restarted.initialize();
    assert_eq!(restarted.current_access_token().as_deref(), Some("a2"));
    assert_eq!(restarted.current_refresh_token().as_deref(), Some("r2"));
}

/// Validates that an unrecoverable refresh wipes only the auth keys.
///
/// # Test Steps
/// 1. Store theme and language preferences next to a session
/// 2. Fail the refresh
/// 3. Verify the session is gone on disk, preferences remain, and one
///    expiry notice was shown
#[tokio::test]
async fn test_failed_refresh_clears_auth_keys_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitflow.json");
    let h = harness(
        &path,
        MockAuthClient::new().with_refresh_result(Err(AuthClientError::Rejected {
            status: 403,
            message: "refresh token revoked".into(),
        })),
    );
    h.storage.set(THEME_KEY, "dark").unwrap();
    h.storage.set(LANGUAGE_KEY, "es").unwrap();
    h.session.set_session("a1".into(), Some("r1".into()), Some(sample_user()));

    let err = h.coordinator.request_refresh().await.unwrap_err();
    assert!(matches!(err, RefreshError::Rejected { status: 403, .. }));

    let reopened = FileStore::open(&path).unwrap();
    assert!(reopened.get("habit_token").is_none());
    assert!(reopened.get("habit_refresh_token").is_none());
    assert!(reopened.get("habit_user").is_none());
    assert_eq!(reopened.get(THEME_KEY).as_deref(), Some("dark"));
    assert_eq!(reopened.get(LANGUAGE_KEY).as_deref(), Some("es"));
    assert_eq!(h.notifier.count(), 1);
}

/// Validates the renewal chain: renew, reschedule from the new expiry,
/// renew again.
#[tokio::test(start_paused = true)]
async fn test_renewal_chain_follows_new_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let clock = MockClock::new();
    let now = clock.now().timestamp();
    let h = harness(&dir.path().join("s.json"), MockAuthClient::new());
    h.client.push_refresh_result(Ok(RefreshedTokens::new(jwt_expiring_at(now + 600))));
    h.client.push_refresh_result(Ok(RefreshedTokens::new(jwt_expiring_at(now + 6000))));

    h.session.set_session(jwt_expiring_at(now + 300), Some("r".into()), None);
    let renewal = ProactiveRenewal::new(
        h.session.clone(),
        h.coordinator.clone(),
        TokenCodec::with_clock(Arc::new(clock.clone())),
        RenewalConfig::default(),
        h.events.clone(),
    );

    // 300s token, 60s lead
    renewal.start();
    tokio::time::sleep(Duration::from_secs(241)).await;
    assert_eq!(h.client.refresh_count(), 1);

    // The mock wall clock has not moved, so the next delay is 600s - 60s
    tokio::time::sleep(Duration::from_secs(540)).await;
    assert_eq!(h.client.refresh_count(), 2);
    assert_eq!(h.session.current_access_token(), Some(jwt_expiring_at(now + 6000)));
    assert!(renewal.is_scheduled());

    renewal.stop();
}

/// Validates that the renewal timer and a 401 handler firing while the
/// timer's refresh is in flight share one refresh call and one token.
#[tokio::test(start_paused = true)]
async fn test_timer_and_401_share_one_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let clock = MockClock::new();
    let now = clock.now().timestamp();
    let renewed = jwt_expiring_at(now + 3600);
    let h = harness(
        &dir.path().join("s.json"),
        MockAuthClient::new()
            .with_refresh_result(Ok(RefreshedTokens::new(renewed.clone())))
            .with_refresh_delay(Duration::from_secs(5)),
    );
    h.session.set_session(jwt_expiring_at(now + 120), Some("r".into()), None);
    let renewal = ProactiveRenewal::new(
        h.session.clone(),
        h.coordinator.clone(),
        TokenCodec::with_clock(Arc::new(clock.clone())),
        RenewalConfig::default(),
        h.events.clone(),
    );

    // The timer fires at 60s and holds the refresh until 65s
    renewal.start();
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(h.coordinator.is_refreshing());

    let reactive = h.coordinator.request_refresh().await;

    assert_eq!(reactive, Ok(renewed.clone()));
    assert_eq!(h.client.refresh_count(), 1);
    assert_eq!(h.session.current_access_token(), Some(renewed));
    assert!(renewal.is_scheduled());

    renewal.stop();
}
