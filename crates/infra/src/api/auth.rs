//! reqwest implementation of the auth server contract
//!
//! Talks to the unauthenticated `/auth/*` endpoints directly over
//! [`HttpClient`], never through the [`RequestGateway`](super::RequestGateway):
//! a 401 from `/auth/refresh` must not trigger another refresh.

use async_trait::async_trait;
use habitflow_common::auth::{AuthClientError, AuthClientTrait, RefreshedTokens};
use habitflow_domain::constants::BEARER_PREFIX;
use habitflow_domain::{
    ApiConfig, LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RefreshResponse,
    Verify2faRequest,
};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::http::{HttpClient, TransportError};

/// Auth server client over HTTP
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    http: HttpClient,
    base_url: String,
}

impl HttpAuthClient {
    /// # Errors
    /// Returns `AuthClientError::ConfigError` if the HTTP client cannot be
    /// built
    pub fn new(config: &ApiConfig) -> Result<Self, AuthClientError> {
        let http = HttpClient::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AuthClientError::ConfigError(e.to_string()))?;

        Ok(Self::with_http_client(http, &config.base_url))
    }

    #[must_use]
    pub fn with_http_client(http: HttpClient, base_url: &str) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string() }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<String, AuthClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(Method::POST, &url).json(body);
        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("{BEARER_PREFIX}{token}"));
        }

        let response = self.http.send(builder).await.map_err(map_transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(|e| map_transport_error(e.into()))?;

        if !status.is_success() {
            let message = rejection_message(status, &text);
            debug!(%url, status = status.as_u16(), %message, "Auth server rejected request");
            return Err(AuthClientError::Rejected { status: status.as_u16(), message });
        }

        Ok(text)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, AuthClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.post(path, body, None).await?;
        serde_json::from_str(&text).map_err(|e| AuthClientError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl AuthClientTrait for HttpAuthClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthClientError> {
        let response: LoginResponse = self.post_json("/auth/login", request).await?;
        info!(requires_2fa = response.requires_2fa, "Login accepted");
        Ok(response)
    }

    async fn verify_two_factor(
        &self,
        request: &Verify2faRequest,
    ) -> Result<LoginResponse, AuthClientError> {
        self.post_json("/auth/verify-2fa", request).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, AuthClientError> {
        let request = RefreshRequest { refresh_token: refresh_token.to_string() };
        let response: RefreshResponse = self.post_json("/auth/refresh", &request).await?;

        let access_token = response.access_token().ok_or_else(|| {
            AuthClientError::ParseError("refresh response carried no access token".to_string())
        })?;

        Ok(RefreshedTokens {
            access_token: access_token.to_string(),
            refresh_token: response.refresh_token.clone(),
        })
    }

    async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthClientError> {
        let request = LogoutRequest { refresh_token: refresh_token.map(str::to_string) };
        self.post("/auth/logout", &request, access_token).await?;
        Ok(())
    }
}

fn map_transport_error(err: TransportError) -> AuthClientError {
    if err.is_offline() {
        warn!(error = %err, "Auth server unreachable");
        AuthClientError::Network(err.to_string())
    } else {
        AuthClientError::ConfigError(err.to_string())
    }
}

/// Error text from a NestJS-style body: `message` is a string or a list of
/// validation messages
fn rejection_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|value| match value.get("message") {
        Some(serde_json::Value::String(message)) => Some(message.clone()),
        Some(serde_json::Value::Array(items)) => Some(
            items.iter().filter_map(serde_json::Value::as_str).collect::<Vec<_>>().join("; "),
        ),
        _ => None,
    });

    match message {
        Some(message) if !message.is_empty() => message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status.canonical_reason().unwrap_or("request rejected").to_string(),
    }
}
