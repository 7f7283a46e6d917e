//! API-specific error types
//!
//! Provides error classification for gateway calls.

use habitflow_common::auth::RefreshError;
use thiserror::Error;

use crate::http::TransportError;

/// Categories of API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// The session is unusable - send the user to login
    Authentication,
    /// 403 - authenticated but not allowed
    Forbidden,
    /// Rate limiting errors (429)
    RateLimit,
    /// Server errors (5xx)
    Server,
    /// Client errors (4xx other than the above) and undecodable bodies
    Client,
    /// No response received
    Network,
    /// Configuration errors - non-retryable
    Config,
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// The retried request was rejected again with a fresh token
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// The token could not be refreshed; the session has been cleared
    #[error("Session expired: {0}")]
    SessionExpired(#[source] RefreshError),

    #[error("Offline: {0}")]
    Offline(String),

    #[error("{url} returned status {status}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Get the error category for this error
    #[must_use]
    pub const fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Unauthorized(_) | Self::SessionExpired(_) => ApiErrorCategory::Authentication,
            Self::Offline(_) => ApiErrorCategory::Network,
            Self::Status { status: 403, .. } => ApiErrorCategory::Forbidden,
            Self::Status { status: 429, .. } => ApiErrorCategory::RateLimit,
            Self::Status { status, .. } if *status >= 500 => ApiErrorCategory::Server,
            Self::Status { .. } | Self::Decode(_) => ApiErrorCategory::Client,
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// Whether the caller should route the user to the login screen
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self.category(), ApiErrorCategory::Authentication)
    }

    /// Whether retrying later without user action might succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::Network | ApiErrorCategory::Server | ApiErrorCategory::RateLimit
        )
    }

    /// HTTP status of a pass-through error
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        if err.is_offline() {
            Self::Offline(err.to_string())
        } else {
            Self::Config(err.to_string())
        }
    }
}
