//! Authentication payloads exchanged with `/auth/*`
//!
//! The server answers logins in two shapes: the current one with
//! `accessToken` + `refreshToken`, and a legacy one with a single `token`.
//! Both are accepted here; [`LoginResponse::credentials`] normalizes them.

use serde::{Deserialize, Serialize};

use super::user::User;

/// `POST /auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /auth/verify-2fa`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verify2faRequest {
    pub user_id: i64,
    pub code: String,
}

/// `POST /auth/refresh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `POST /auth/logout`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Response to a login or two-factor verification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default, rename = "requires2FA")]
    pub requires_2fa: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Legacy single-token shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Tokens extracted from a login response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    /// Absent for the legacy single-token shape
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// Legacy sessions cannot be refreshed
    #[must_use]
    pub const fn is_legacy(&self) -> bool {
        self.refresh_token.is_none()
    }
}

impl LoginResponse {
    /// Normalize the two token shapes. `accessToken` wins over `token`.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        if let Some(access) = &self.access_token {
            return Some(Credentials {
                access_token: access.clone(),
                refresh_token: self.refresh_token.clone(),
            });
        }
        self.token
            .as_ref()
            .map(|token| Credentials { access_token: token.clone(), refresh_token: None })
    }
}

/// Response to `POST /auth/refresh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Present only when the server rotates refresh tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl RefreshResponse {
    /// The new access token in either shape
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().or(self.token.as_deref())
    }
}
