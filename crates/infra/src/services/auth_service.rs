//! Login, two-factor, logout, account and profile flows over the session
//! core.
//!
//! The service owns no state of its own. Tokens live in [`SessionState`],
//! refreshes go through the coordinator behind the [`RequestGateway`], and
//! the renewal timer is started after every successful login. Registration,
//! email verification and password reset are public endpoints sent without
//! the bearer token.
//!
//! # Example
//!
//! ```no_run
//! use habitflow_infra::services::{AuthService, LoginOutcome};
//! use habitflow_infra::AppContext;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let context = AppContext::new(habitflow_infra::config::load()?)?;
//! let auth: &AuthService = &context.auth;
//!
//! match auth.login("ana@example.com", "secret").await? {
//!     LoginOutcome::TwoFactorRequired { user_id, .. } => {
//!         auth.verify_two_factor(user_id, "123456").await?;
//!     }
//!     LoginOutcome::Authenticated { .. } => {}
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use habitflow_common::auth::{
    AuthClientError, AuthClientTrait, ProactiveRenewal, SessionEvent, SessionEvents,
    SessionState, TokenCodec,
};
use habitflow_domain::{
    EmailRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    RegisterResponse, ResetPasswordRequest, UpdateProfileRequest, User, Verify2faRequest,
    VerifyEmailRequest, VerifyEmailResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{ApiError, ApiRequest, RequestGateway};

/// Failure of an [`AuthService`] flow
#[derive(Debug, Error)]
pub enum AuthServiceError {
    #[error(transparent)]
    Client(#[from] AuthClientError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The server accepted the login but sent no token
    #[error("login response carried no access token")]
    MissingCredentials,

    #[error("invalid login response: {0}")]
    InvalidResponse(String),
}

/// Result of a login or two-factor verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A code was sent; call [`AuthService::verify_two_factor`]
    TwoFactorRequired { user_id: i64, email: Option<String>, message: String },
    /// The session is installed
    Authenticated {
        user: Option<User>,
        /// Single-token login without a refresh token
        legacy: bool,
    },
}

/// Route-guard verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    RedirectToLogin,
}

pub struct AuthService {
    session: Arc<SessionState>,
    client: Arc<dyn AuthClientTrait>,
    gateway: Arc<RequestGateway>,
    renewal: Arc<ProactiveRenewal>,
    events: SessionEvents,
    codec: TokenCodec,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("authenticated", &self.session.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(
        session: Arc<SessionState>,
        client: Arc<dyn AuthClientTrait>,
        gateway: Arc<RequestGateway>,
        renewal: Arc<ProactiveRenewal>,
        events: SessionEvents,
        codec: TokenCodec,
    ) -> Self {
        Self { session, client, gateway, renewal, events, codec }
    }

    /// Load the persisted session and resume renewal if it holds a token.
    ///
    /// Returns whether a session was restored.
    pub fn restore_session(&self) -> bool {
        self.session.initialize();
        if !self.session.is_authenticated() {
            return false;
        }

        info!(refreshable = self.session.snapshot().can_refresh(), "Restored session");
        self.renewal.start();
        true
    }

    /// # Errors
    /// Returns `AuthServiceError::Client` if the server rejects the
    /// credentials or cannot be reached
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthServiceError> {
        let request = LoginRequest { email: email.to_string(), password: password.to_string() };

        self.session.set_loading(true);
        let result = self.client.login(&request).await;
        self.session.set_loading(false);

        self.complete_login(result?)
    }

    /// Finish a login that answered [`LoginOutcome::TwoFactorRequired`]
    ///
    /// # Errors
    /// Returns `AuthServiceError::Client` if the code is rejected
    #[instrument(skip(self, code))]
    pub async fn verify_two_factor(
        &self,
        user_id: i64,
        code: &str,
    ) -> Result<LoginOutcome, AuthServiceError> {
        let request = Verify2faRequest { user_id, code: code.to_string() };

        self.session.set_loading(true);
        let result = self.client.verify_two_factor(&request).await;
        self.session.set_loading(false);

        match self.complete_login(result?)? {
            LoginOutcome::TwoFactorRequired { .. } => Err(AuthServiceError::InvalidResponse(
                "two-factor verification asked for another code".to_string(),
            )),
            outcome => Ok(outcome),
        }
    }

    fn complete_login(&self, response: LoginResponse) -> Result<LoginOutcome, AuthServiceError> {
        if response.requires_2fa {
            let user_id = response.user_id.ok_or_else(|| {
                AuthServiceError::InvalidResponse("two-factor challenge without userId".to_string())
            })?;
            info!(user_id, "Two-factor code required");
            return Ok(LoginOutcome::TwoFactorRequired {
                user_id,
                email: response.email,
                message: response.message,
            });
        }

        let credentials = response.credentials().ok_or(AuthServiceError::MissingCredentials)?;
        let legacy = credentials.is_legacy();
        let user = response.user;

        self.session.set_session(
            credentials.access_token,
            credentials.refresh_token,
            user.clone(),
        );
        self.events.emit(SessionEvent::LoggedIn);
        info!(legacy, user_id = user.as_ref().map(|u| u.id), "Logged in");

        self.renewal.start();
        Ok(LoginOutcome::Authenticated { user, legacy })
    }

    /// Tell the server, then clear the local session whatever it answered
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.renewal.stop();

        let snapshot = self.session.snapshot();
        if snapshot.has_credentials() {
            if let Err(err) = self
                .client
                .logout(snapshot.access_token.as_deref(), snapshot.refresh_token.as_deref())
                .await
            {
                warn!(error = %err, "Server logout failed, clearing local session anyway");
            }
        }

        self.logout_local();
    }

    /// Clear the session without contacting the server
    pub fn logout_local(&self) {
        self.renewal.stop();
        self.session.clear();
        self.events.emit(SessionEvent::LoggedOut);
        info!("Logged out");
    }

    /// `GET /auth/profile`, stored as the current user
    ///
    /// # Errors
    /// Returns `AuthServiceError::Api` for any gateway failure, including an
    /// expired session
    pub async fn fetch_profile(&self) -> Result<User, AuthServiceError> {
        let user: User = self.gateway.get("/auth/profile").await?;
        self.session.update_user(user.clone());
        Ok(user)
    }

    /// Create an account. No session is installed; the email must be
    /// verified and the user must log in.
    ///
    /// # Errors
    /// Returns `AuthServiceError::Api` with the server's status if the
    /// registration is refused
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(
        &self,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, AuthServiceError> {
        let response: RegisterResponse = self.post_public("/auth/register", request).await?;
        info!(requires_verification = response.requires_verification, "Account registered");
        Ok(response)
    }

    /// Confirm an email address with the code that was mailed to it
    ///
    /// # Errors
    /// Returns `AuthServiceError::Api` if the code is refused
    pub async fn verify_email(
        &self,
        email: &str,
        code: &str,
    ) -> Result<VerifyEmailResponse, AuthServiceError> {
        let request = VerifyEmailRequest { email: email.to_string(), code: code.to_string() };
        self.post_public("/verification/verify-email", &request).await
    }

    /// Mail a new verification code
    ///
    /// # Errors
    /// Returns `AuthServiceError::Api` on any gateway failure
    pub async fn resend_code(&self, email: &str) -> Result<MessageResponse, AuthServiceError> {
        let request = EmailRequest { email: email.to_string() };
        self.post_public("/verification/resend-code", &request).await
    }

    /// Mail a password reset code
    ///
    /// # Errors
    /// Returns `AuthServiceError::Api` on any gateway failure
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<MessageResponse, AuthServiceError> {
        let request = EmailRequest { email: email.to_string() };
        self.post_public("/verification/request-password-reset", &request).await
    }

    /// # Errors
    /// Returns `AuthServiceError::Api` if the code is refused
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<MessageResponse, AuthServiceError> {
        self.post_public("/verification/reset-password", request).await
    }

    /// `PATCH /users/profile`, stored as the current user
    ///
    /// # Errors
    /// Returns `AuthServiceError::Api` for any gateway failure; the stored
    /// user is left unchanged
    pub async fn update_profile(
        &self,
        changes: &UpdateProfileRequest,
    ) -> Result<User, AuthServiceError> {
        let user: User = self.gateway.patch("/users/profile", changes).await?;
        self.session.update_user(user.clone());
        info!(user_id = user.id, "Profile updated");
        Ok(user)
    }

    /// `DELETE /users/account`, then clear the local session
    ///
    /// # Errors
    /// Returns `AuthServiceError::Api` if the server did not delete the
    /// account; the session is kept in that case
    #[instrument(skip(self))]
    pub async fn delete_account(&self) -> Result<(), AuthServiceError> {
        self.gateway.send(ApiRequest::delete("/users/account")).await?;
        info!("Account deleted");
        self.logout_local();
        Ok(())
    }

    async fn post_public<B, T>(&self, path: &str, body: &B) -> Result<T, AuthServiceError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Default,
    {
        let request = ApiRequest::post(path).json(body)?.anonymous();
        let response = self.gateway.send(request).await?;
        Ok(response.json::<Option<T>>()?.unwrap_or_default())
    }

    /// Whether a protected screen may be shown
    ///
    /// An expired access token logs the user out.
    pub fn check_access(&self) -> AccessDecision {
        let Some(token) = self.session.current_access_token() else {
            return AccessDecision::RedirectToLogin;
        };

        if self.codec.is_expired(&token, 0) {
            warn!("Expired access token at access check");
            self.logout_local();
            return AccessDecision::RedirectToLogin;
        }

        AccessDecision::Allow
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.gateway
    }

    #[must_use]
    pub fn renewal(&self) -> &Arc<ProactiveRenewal> {
        &self.renewal
    }
}
