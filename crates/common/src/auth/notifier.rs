//! User-facing transient notices
//!
//! The session core reports a few conditions to the user (expired session,
//! lost connection) without knowing how they are shown. The UI layer
//! supplies a [`Notifier`]; headless builds use [`TracingNotifier`].

use std::fmt;

use tracing::{error, info, warn};

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Danger,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Danger => "danger",
        };
        f.write_str(name)
    }
}

/// A short message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into() }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    #[must_use]
    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Danger, message)
    }
}

/// Fire-and-forget sink for notices
///
/// Implementations must not block; the caller never waits on the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    fn notify(&self, notice: Notice) {
        (**self).notify(notice);
    }
}

/// Notifier that writes notices to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => {
                info!(level = %notice.level, "{}", notice.message);
            }
            NoticeLevel::Warning => warn!(level = %notice.level, "{}", notice.message),
            NoticeLevel::Danger => error!(level = %notice.level, "{}", notice.message),
        }
    }
}
