//! In-memory session with durable write-through
//!
//! [`SessionState`] is the single authority on the current credentials.
//! Every mutation is written to the [`TokenStore`] first and then published
//! through a `watch` cell in a single update, so readers observe either the
//! old or the new session and never a half-updated one.

use std::sync::atomic::{AtomicBool, Ordering};

use habitflow_domain::User;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::store::{PersistedSession, TokenStore};
use super::types::Session;
use crate::storage::StorageResult;

/// Observable session cell backed by durable storage
#[derive(Debug)]
pub struct SessionState {
    store: TokenStore,
    cell: watch::Sender<Session>,
    initialized: AtomicBool,
}

impl SessionState {
    #[must_use]
    pub fn new(store: TokenStore) -> Self {
        let (cell, _) = watch::channel(Session::default());
        Self { store, cell, initialized: AtomicBool::new(false) }
    }

    /// Seed the session from storage
    ///
    /// Only the first call reads storage; later calls are no-ops.
    ///
    /// # Returns
    /// Whether a stored access token was found on this call
    pub fn initialize(&self) -> bool {
        if self.initialized.swap(true, Ordering::AcqRel) {
            debug!("Session already initialized, ignoring");
            return false;
        }

        let PersistedSession { access_token, refresh_token, user } = self.store.load();
        let restored = access_token.is_some();

        self.cell.send_modify(|session| {
            session.access_token = access_token;
            session.refresh_token = refresh_token;
            session.current_user = user;
        });

        if restored {
            info!("Restored session from storage");
        } else {
            debug!("No stored session");
        }
        restored
    }

    /// Replace the credentials and user after a login
    pub fn set_session(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        user: Option<User>,
    ) {
        let persisted = PersistedSession {
            access_token: Some(access_token),
            refresh_token,
            user,
        };
        log_write_failure("session", self.store.save(&persisted));

        self.cell.send_modify(|session| {
            session.access_token = persisted.access_token;
            session.refresh_token = persisted.refresh_token;
            session.current_user = persisted.user;
        });
        debug!("Session credentials replaced");
    }

    /// Swap in a refreshed access token, keeping everything else
    pub fn update_access_token(&self, token: String) {
        log_write_failure("access token", self.store.save_access_token(Some(&token)));
        self.cell.send_modify(|session| session.access_token = Some(token));
    }

    /// Swap in a rotated refresh token
    pub fn update_refresh_token(&self, token: String) {
        log_write_failure("refresh token", self.store.save_refresh_token(Some(&token)));
        self.cell.send_modify(|session| session.refresh_token = Some(token));
    }

    pub fn update_user(&self, user: User) {
        log_write_failure("user", self.store.save_user(Some(&user)));
        self.cell.send_modify(|session| session.current_user = Some(user));
    }

    /// Loading is transient and never persisted
    pub fn set_loading(&self, loading: bool) {
        self.cell.send_if_modified(|session| {
            let changed = session.is_loading != loading;
            session.is_loading = loading;
            changed
        });
    }

    /// Drop all credentials, in memory and on disk
    ///
    /// Preference keys are left alone. Clearing an empty session is a no-op
    /// apart from the storage removal.
    pub fn clear(&self) {
        log_write_failure("cleared session", self.store.clear());
        self.cell.send_replace(Session::default());
        debug!("Session cleared");
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.cell.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.cell.borrow().is_authenticated()
    }

    #[must_use]
    pub fn current_access_token(&self) -> Option<String> {
        self.cell.borrow().access_token.clone()
    }

    #[must_use]
    pub fn current_refresh_token(&self) -> Option<String> {
        self.cell.borrow().refresh_token.clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.cell.borrow().current_user.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.cell.borrow().is_loading
    }

    /// Receiver that observes every published session
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.cell.subscribe()
    }
}

fn log_write_failure(what: &str, result: StorageResult<()>) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to persist {what}; keeping in-memory value");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use habitflow_domain::constants::{THEME_KEY, TOKEN_KEY};

    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};
    use crate::testing::{sample_user, FailingStore};

    fn session_over(backend: Arc<dyn KeyValueStore>) -> SessionState {
        SessionState::new(TokenStore::new(backend))
    }

    #[test]
    fn test_initialize_restores_once() {
        let backend = Arc::new(MemoryStore::new());
        let store = TokenStore::new(backend.clone());
        store.save_access_token(Some("a1")).unwrap();
        store.save_refresh_token(Some("r1")).unwrap();

        let state = SessionState::new(store.clone());
        assert!(state.initialize());
        assert_eq!(state.current_access_token().as_deref(), Some("a1"));
        assert_eq!(state.current_refresh_token().as_deref(), Some("r1"));

        // A second initialize must not re-read storage
        store.save_access_token(Some("a2")).unwrap();
        assert!(!state.initialize());
        assert_eq!(state.current_access_token().as_deref(), Some("a1"));
    }

    #[test]
    fn test_initialize_without_stored_session() {
        let state = session_over(Arc::new(MemoryStore::new()));
        assert!(!state.initialize());
        assert!(!state.is_authenticated());
    }

    #[test]
    fn test_set_session_persists_and_publishes() {
        let backend = Arc::new(MemoryStore::new());
        let state = session_over(backend.clone());
        let user = sample_user();

        state.set_session("a".into(), Some("r".into()), Some(user.clone()));

        assert!(state.is_authenticated());
        assert_eq!(state.current_user(), Some(user.clone()));
        let persisted = TokenStore::new(backend).load();
        assert_eq!(persisted.access_token.as_deref(), Some("a"));
        assert_eq!(persisted.refresh_token.as_deref(), Some("r"));
        assert_eq!(persisted.user, Some(user));
    }

    #[test]
    fn test_legacy_session_has_no_refresh_token() {
        let backend = Arc::new(MemoryStore::new());
        let state = session_over(backend.clone());
        backend.set("habit_refresh_token", "stale").unwrap();

        state.set_session("legacy".into(), None, None);

        assert!(state.is_authenticated());
        assert!(state.current_refresh_token().is_none());
        assert!(TokenStore::new(backend).load().refresh_token.is_none());
    }

    #[test]
    fn test_update_access_token_keeps_other_fields() {
        let state = session_over(Arc::new(MemoryStore::new()));
        state.set_session("old".into(), Some("r".into()), Some(sample_user()));

        state.update_access_token("new".into());

        let snapshot = state.snapshot();
        assert_eq!(snapshot.access_token.as_deref(), Some("new"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("r"));
        assert!(snapshot.current_user.is_some());
    }

    #[test]
    fn test_clear_is_idempotent_and_keeps_preferences() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(THEME_KEY, "dark").unwrap();
        let state = session_over(backend.clone());
        state.set_session("a".into(), Some("r".into()), None);

        state.clear();
        state.clear();

        assert_eq!(state.snapshot(), Session::default());
        assert!(!backend.contains_key(TOKEN_KEY));
        assert_eq!(backend.get(THEME_KEY).as_deref(), Some("dark"));
    }

    #[test]
    fn test_storage_failure_still_updates_memory() {
        let state = session_over(Arc::new(FailingStore));

        state.set_session("a".into(), Some("r".into()), None);
        assert_eq!(state.current_access_token().as_deref(), Some("a"));

        state.clear();
        assert!(!state.is_authenticated());
    }

    #[tokio::test]
    async fn test_subscribers_see_whole_updates() {
        let state = session_over(Arc::new(MemoryStore::new()));
        let mut rx = state.subscribe();

        state.set_session("a".into(), Some("r".into()), Some(sample_user()));
        rx.changed().await.unwrap();
        {
            let seen = rx.borrow_and_update();
            assert_eq!(seen.access_token.as_deref(), Some("a"));
            assert_eq!(seen.refresh_token.as_deref(), Some("r"));
            assert!(seen.current_user.is_some());
        }

        state.clear();
        rx.changed().await.unwrap();
        assert!(!rx.borrow().is_authenticated());
    }

    #[test]
    fn test_set_loading_only_notifies_on_change() {
        let state = session_over(Arc::new(MemoryStore::new()));
        let mut rx = state.subscribe();

        state.set_loading(false);
        assert!(!rx.has_changed().unwrap());

        state.set_loading(true);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_loading);
    }
}
