//! Traits for the auth server
//!
//! The session core never talks HTTP directly. It is handed an
//! [`AuthClientTrait`] implementation (`habitflow_infra::api::HttpAuthClient`
//! in production, `testing::MockAuthClient` in tests).

use async_trait::async_trait;
use habitflow_domain::{LoginRequest, LoginResponse, Verify2faRequest};

use super::types::RefreshedTokens;

/// Error type for auth server calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthClientError {
    /// The server answered with a non-success status
    Rejected { status: u16, message: String },

    /// No response was received (connect, timeout, TLS)
    Network(String),

    /// The response body could not be understood
    ParseError(String),

    /// Invalid client configuration
    ConfigError(String),
}

impl AuthClientError {
    /// Status code of a rejection, if the server answered
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { status, message } => {
                write!(f, "Auth server rejected request ({status}): {message}")
            }
            Self::Network(msg) => write!(f, "Auth server unreachable: {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for AuthClientError {}

/// Trait for auth server operations
#[async_trait]
pub trait AuthClientTrait: Send + Sync {
    /// Exchange credentials for tokens, or learn that a second factor is
    /// required
    ///
    /// # Errors
    /// Returns error if the credentials are rejected or the server is
    /// unreachable
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthClientError>;

    /// Complete a two-factor login
    ///
    /// # Errors
    /// Returns error if the code is rejected or the server is unreachable
    async fn verify_two_factor(
        &self,
        request: &Verify2faRequest,
    ) -> Result<LoginResponse, AuthClientError>;

    /// Trade a refresh token for a new access token
    ///
    /// # Arguments
    /// * `refresh_token` - Refresh token from the current session
    ///
    /// # Returns
    /// The new access token and, when the server rotates them, a new
    /// refresh token
    ///
    /// # Errors
    /// Returns error if the refresh token is rejected, the server is
    /// unreachable, or the response carries no access token
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, AuthClientError>;

    /// Tell the server the session is over
    ///
    /// # Arguments
    /// * `access_token` - Bearer token for the call, if still held
    /// * `refresh_token` - Refresh token to revoke, if held
    ///
    /// # Errors
    /// Returns error if the call fails; callers treat this as advisory
    async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthClientError>;
}
