//! Testing utilities and helpers
//!
//! - **[`fixtures`]**: deterministic tokens, users and login payloads
//! - **[`mocks`]**: `MockAuthClient`, `RecordingNotifier`, `FailingStore`
//! - **[`time`]**: `MockClock` for expiry checks
//!
//! Timer behaviour is tested with Tokio's paused clock
//! (`#[tokio::test(start_paused = true)]`); [`MockClock`] only pins the
//! wall-clock time tokens are compared against.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use habitflow_common::auth::TokenCodec;
//! use habitflow_common::testing::{jwt_expiring_at, MockClock};
//! use habitflow_common::time::Clock;
//!
//! let clock = MockClock::new();
//! let codec = TokenCodec::with_clock(Arc::new(clock.clone()));
//! let token = jwt_expiring_at(clock.now().timestamp() + 30);
//!
//! assert!(!codec.is_expired(&token, 0));
//! clock.advance(chrono::Duration::seconds(31));
//! assert!(codec.is_expired(&token, 0));
//! ```

pub mod fixtures;
pub mod mocks;
pub mod time;

pub use fixtures::{
    jwt_expiring_at, jwt_with_claims, legacy_login_response, login_response, sample_user,
    two_factor_response,
};
pub use mocks::{FailingStore, MockAuthClient, RecordingNotifier};
pub use time::MockClock;
