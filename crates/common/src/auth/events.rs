//! Session lifecycle events
//!
//! Components that care about session transitions (navigation, caches keyed
//! by user) subscribe here instead of polling [`super::SessionState`].

use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per subscriber before the oldest are dropped
const EVENT_CAPACITY: usize = 32;

/// A session transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credentials were installed by a login or two-factor verification
    LoggedIn,

    /// The access token was renewed
    Refreshed,

    /// The session was cleared because it could not be renewed
    Expired { reason: String },

    /// The user logged out
    LoggedOut,
}

/// Broadcast fan-out of [`SessionEvent`]s
///
/// Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn emit(&self, event: SessionEvent) {
        trace!(?event, "Session event");
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}
