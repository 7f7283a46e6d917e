//! Durable mirror of the session
//!
//! Auth fields live under fixed keys in the shared [`KeyValueStore`]
//! namespace. Preference keys (theme, language) share that namespace and
//! survive [`TokenStore::clear`].

use std::sync::Arc;

use habitflow_domain::constants::{AUTH_KEYS, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};
use habitflow_domain::User;
use tracing::{debug, warn};

use crate::storage::{KeyValueStore, StorageResult};

/// Session fields as last written to storage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

/// Typed access to the auth keys of a [`KeyValueStore`]
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Read every auth field
    ///
    /// A stored user that no longer parses is logged and dropped; the tokens
    /// are still returned.
    #[must_use]
    pub fn load(&self) -> PersistedSession {
        let user = self.storage.get(USER_KEY).and_then(|raw| {
            serde_json::from_str::<User>(&raw)
                .map_err(|e| warn!(error = %e, "Discarding unreadable stored user"))
                .ok()
        });

        PersistedSession {
            access_token: self.storage.get(TOKEN_KEY),
            refresh_token: self.storage.get(REFRESH_TOKEN_KEY),
            user,
        }
    }

    /// Write all three fields; `None` removes the key
    ///
    /// # Errors
    /// Returns the first storage failure. Fields before it are already
    /// written.
    pub fn save(&self, session: &PersistedSession) -> StorageResult<()> {
        self.save_access_token(session.access_token.as_deref())?;
        self.save_refresh_token(session.refresh_token.as_deref())?;
        self.save_user(session.user.as_ref())
    }

    /// # Errors
    /// Returns an error if the backend write fails
    pub fn save_access_token(&self, token: Option<&str>) -> StorageResult<()> {
        self.put(TOKEN_KEY, token)
    }

    /// # Errors
    /// Returns an error if the backend write fails
    pub fn save_refresh_token(&self, token: Option<&str>) -> StorageResult<()> {
        self.put(REFRESH_TOKEN_KEY, token)
    }

    /// # Errors
    /// Returns an error if the user cannot be serialized or written
    pub fn save_user(&self, user: Option<&User>) -> StorageResult<()> {
        match user {
            Some(user) => {
                let json = serde_json::to_string(user)?;
                self.storage.set(USER_KEY, &json)
            }
            None => self.storage.remove(USER_KEY),
        }
    }

    /// Remove the auth keys, leaving preferences in place
    ///
    /// # Errors
    /// Returns the first removal failure; remaining keys are still attempted
    pub fn clear(&self) -> StorageResult<()> {
        let mut first_error = None;
        for key in AUTH_KEYS {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove auth key");
                first_error.get_or_insert(e);
            }
        }
        debug!("Cleared persisted auth keys");
        first_error.map_or(Ok(()), Err)
    }

    fn put(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        match value {
            Some(value) => self.storage.set(key, value),
            None => self.storage.remove(key),
        }
    }
}
