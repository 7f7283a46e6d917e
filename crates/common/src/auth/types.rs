//! Session and token types
//!
//! [`Session`] is the in-memory record owned by `SessionState`;
//! [`DecodedToken`] is derived on demand from an access token and never
//! stored.

use chrono::{DateTime, Utc};
use habitflow_domain::User;

/// The authoritative in-memory session
///
/// `is_authenticated()` is derived from `access_token` alone. A session may
/// carry an access token without a refresh token (legacy single-token
/// logins); such a session cannot be refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Short-lived bearer credential
    pub access_token: Option<String>,

    /// Longer-lived credential used solely to obtain new access tokens
    pub refresh_token: Option<String>,

    /// Cached profile snapshot
    pub current_user: Option<User>,

    /// True while a login or refresh call is in flight
    pub is_loading: bool,
}

impl Session {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// True when either credential is held
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some()
    }
}

/// Claims extracted from a token payload (signature not verified)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    /// `sub` claim; numeric subjects are rendered as strings
    pub subject: Option<String>,

    /// `iat` claim, Unix seconds
    pub issued_at: Option<i64>,

    /// `exp` claim, Unix seconds
    pub expires_at: i64,

    pub email: Option<String>,

    /// Custom `type` claim (`access` / `refresh`) when the server sets one
    pub token_type: Option<String>,
}

impl DecodedToken {
    /// Expiry as a UTC timestamp, `None` if `exp` is out of range
    #[must_use]
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }
}

/// Tokens returned by a successful refresh call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,

    /// Present only when the server rotates refresh tokens
    pub refresh_token: Option<String>,
}

impl RefreshedTokens {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: None }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_derived_flags() {
        let mut session = Session::default();
        assert!(!session.is_authenticated());
        assert!(!session.has_credentials());

        session.refresh_token = Some("r".to_string());
        assert!(!session.is_authenticated());
        assert!(session.can_refresh());
        assert!(session.has_credentials());

        session.access_token = Some("a".to_string());
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_decoded_token_expiry_timestamp() {
        let decoded = DecodedToken {
            subject: Some("1".to_string()),
            issued_at: None,
            expires_at: 1_700_000_000,
            email: None,
            token_type: None,
        };

        assert_eq!(decoded.expires_at_utc().map(|dt| dt.timestamp()), Some(1_700_000_000));
    }
}
