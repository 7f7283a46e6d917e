//! Authenticated request gateway
//!
//! Every call to the Habitflow API goes through [`RequestGateway::send`]. It
//! attaches the current bearer token, and on a 401 asks the
//! [`RefreshCoordinator`] for a fresh token and resends the request once.
//! Concurrent 401s share a single refresh.

use std::sync::Arc;

use habitflow_common::auth::{Notice, Notifier, RefreshCoordinator, SessionState};
use habitflow_domain::constants::{BEARER_PREFIX, CONNECTION_ERROR_MESSAGE};
use habitflow_domain::ApiConfig;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::errors::ApiError;
use super::request::{ApiRequest, ApiResponse};
use crate::http::{HttpClient, TransportError};

/// API client that owns the 401 → refresh → retry cycle
pub struct RequestGateway {
    http: HttpClient,
    base_url: String,
    session: Arc<SessionState>,
    coordinator: Arc<RefreshCoordinator>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl RequestGateway {
    /// Create a gateway for `config.base_url`
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the base URL does not parse or the HTTP
    /// client cannot be built
    pub fn new(
        config: &ApiConfig,
        session: Arc<SessionState>,
        coordinator: Arc<RefreshCoordinator>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        url::Url::parse(&config.base_url).map_err(|e| {
            ApiError::Config(format!("Invalid API base URL '{}': {e}", config.base_url))
        })?;

        let http = HttpClient::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HttpClient: {e}")))?;

        Ok(Self::with_http_client(http, &config.base_url, session, coordinator, notifier))
    }

    /// Create a gateway over an existing transport
    #[must_use]
    pub fn with_http_client(
        http: HttpClient,
        base_url: &str,
        session: Arc<SessionState>,
        coordinator: Arc<RefreshCoordinator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            coordinator,
            notifier,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request, refreshing the session once on 401
    ///
    /// # Errors
    /// - `ApiError::SessionExpired` if the 401 could not be cured by a
    ///   refresh (the session has been cleared)
    /// - `ApiError::Unauthorized` if the retried request was rejected again
    /// - `ApiError::Offline` if no response was received
    /// - `ApiError::Status` for any other non-success status
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let token = if request.anonymous { None } else { self.session.current_access_token() };

        let (status, body) = self.execute(&request, token.as_deref()).await?;
        if status != StatusCode::UNAUTHORIZED || request.anonymous {
            return self.finish(&request, status, body);
        }

        // Another caller may have renewed the token while this one was out
        let fresh = match self.session.current_access_token() {
            Some(current) if token.as_deref() != Some(current.as_str()) => {
                debug!("Access token changed since the request was sent, resending");
                current
            }
            _ => {
                info!("Access token rejected, refreshing session");
                self.coordinator.request_refresh().await.map_err(|err| {
                    warn!(error = %err, "Session could not be refreshed");
                    ApiError::SessionExpired(err)
                })?
            }
        };

        let (status, body) = self.execute(&request, Some(&fresh)).await?;
        if status == StatusCode::UNAUTHORIZED {
            warn!("Request rejected again with a refreshed token");
            return Err(ApiError::Unauthorized(format!(
                "{} rejected a freshly refreshed token",
                self.url_for(&request.path)
            )));
        }

        self.finish(&request, status, body)
    }

    /// GET `path` and decode the JSON body
    ///
    /// # Errors
    /// See [`RequestGateway::send`]; also `ApiError::Decode`
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    /// POST a JSON body to `path` and decode the JSON response
    ///
    /// # Errors
    /// See [`RequestGateway::send`]; also `ApiError::Decode`
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    /// PUT a JSON body to `path`
    ///
    /// # Errors
    /// See [`RequestGateway::send`]; also `ApiError::Decode`
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    /// PATCH `path` with a JSON body
    ///
    /// # Errors
    /// See [`RequestGateway::send`]; also `ApiError::Decode`
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::patch(path).json(body)?).await?.json()
    }

    /// DELETE `path`
    ///
    /// # Errors
    /// See [`RequestGateway::send`]; also `ApiError::Decode`
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::delete(path)).await?.json()
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<(StatusCode, String), ApiError> {
        let url = self.url_for(&request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("{BEARER_PREFIX}{token}"));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = self.http.send(builder).await.map_err(|e| self.transport_failure(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_failure(e.into()))?;

        Ok((status, body))
    }

    fn transport_failure(&self, err: TransportError) -> ApiError {
        if err.is_offline() {
            warn!(error = %err, "No response from server");
            self.notifier.notify(Notice::danger(CONNECTION_ERROR_MESSAGE));
        }
        ApiError::from(err)
    }

    fn finish(
        &self,
        request: &ApiRequest,
        status: StatusCode,
        body: String,
    ) -> Result<ApiResponse, ApiError> {
        if status.is_success() {
            debug!(status = status.as_u16(), "Request successful");
            return Ok(ApiResponse { status, body });
        }

        debug!(status = status.as_u16(), "Request failed with status");
        Err(ApiError::Status { status: status.as_u16(), url: self.url_for(&request.path), body })
    }
}
