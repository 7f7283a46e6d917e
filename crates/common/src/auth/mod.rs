//! Session and token lifecycle
//!
//! Everything the client needs to hold a bearer session: decoding tokens,
//! persisting them, refreshing them exactly once under contention, and
//! renewing them before they expire.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌────────────────────┐
//! │ ProactiveRenewal │────►│ RefreshCoordinator │────► AuthClientTrait
//! └────────┬─────────┘     └─────────┬──────────┘
//!          │                         ├────► SessionEvents (broadcast)
//!          │                         ├────► Notifier (transient notices)
//!          ▼                         ▼
//! ┌──────────────────────────────────────────────┐
//! │ SessionState   (watch cell, write-through)   │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!                  TokenStore ────► KeyValueStore (memory / JSON file)
//! ```
//!
//! The request gateway and login orchestration live in `habitflow-infra`;
//! they only reach the session through the types re-exported here.
//!
//! # Module Organization
//!
//! - **[`types`]**: `Session`, `DecodedToken`, `RefreshedTokens`
//! - **[`codec`]**: payload decoding and expiry checks
//! - **[`store`]**: durable mirror of the session
//! - **[`session`]**: the observable in-memory session
//! - **[`coordinator`]**: single-flight refresh
//! - **[`renewal`]**: refresh ahead of expiry
//! - **[`events`]** / **[`notifier`]**: outbound signals
//! - **[`traits`]**: the auth server contract

pub mod codec;
pub mod coordinator;
pub mod events;
pub mod notifier;
pub mod renewal;
pub mod session;
pub mod store;
pub mod traits;
pub mod types;

pub use codec::{TokenCodec, TokenDecodeError};
pub use coordinator::{RefreshCoordinator, RefreshError, RefreshOutcome};
pub use events::{SessionEvent, SessionEvents};
pub use notifier::{Notice, NoticeLevel, Notifier, TracingNotifier};
pub use renewal::{ProactiveRenewal, RenewalConfig};
pub use session::SessionState;
pub use store::{PersistedSession, TokenStore};
pub use traits::{AuthClientError, AuthClientTrait};
pub use types::{DecodedToken, RefreshedTokens, Session};
