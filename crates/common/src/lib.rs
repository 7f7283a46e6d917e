//! Session core shared across Habitflow crates.
//!
//! # Modules
//!
//! - [`auth`]: token codec, session state, single-flight refresh, proactive
//!   renewal
//! - [`storage`]: the key-value namespace the session persists into
//! - [`time`]: wall-clock abstraction used for token expiry
//! - `testing`: mocks and fixtures (`test-utils` feature)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod storage;
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

pub use auth::{
    AuthClientError, AuthClientTrait, Notifier, ProactiveRenewal, RefreshCoordinator,
    RefreshError, Session, SessionEvent, SessionEvents, SessionState, TokenCodec, TokenStore,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, StorageResult};
pub use time::{Clock, SystemClock};
