//! Durable key-value storage
//!
//! The session core persists its token fields through [`KeyValueStore`], the
//! same flat string namespace the rest of the client uses for theme and
//! language preferences. Two backends ship here:
//!
//! - [`MemoryStore`]: process-local map, used in tests and for
//!   "remember nothing" sessions
//! - [`FileStore`]: JSON map on disk, written atomically (tmp + rename)
//!
//! Reads never fail: an unreadable value is reported as absent. Writes
//! return a [`StorageResult`] so callers can decide whether to log or
//! propagate.

pub mod error;
pub mod file;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Synchronous string key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or `None` when absent or unreadable
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the removal
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Remove every key, including non-auth preferences
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the change
    fn clear(&self) -> StorageResult<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn clear(&self) -> StorageResult<()> {
        (**self).clear()
    }
}
