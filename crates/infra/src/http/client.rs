use std::time::Duration;

use habitflow_domain::constants::DEFAULT_API_TIMEOUT_SECS;
use habitflow_domain::HabitflowError;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use thiserror::Error;
use tracing::debug;

/// No HTTP response was obtained
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request itself was malformed (bad URL, bad header)
    #[error("request could not be built: {0}")]
    Build(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// True when the failure says nothing about the request, only about
    /// reachability
    #[must_use]
    pub const fn is_offline(&self) -> bool {
        !matches!(self, Self::Build(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_builder() {
            Self::Build(message)
        } else if err.is_timeout() {
            Self::Timeout(message)
        } else if err.is_connect() {
            Self::Connect(message)
        } else {
            Self::Other(message)
        }
    }
}

/// reqwest client with the crate's timeout and user agent applied.
///
/// Sends each request exactly once; status codes are returned to the caller
/// untouched.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder.
    ///
    /// # Errors
    /// Returns [`TransportError`] when no response was received. Error
    /// statuses are not errors here.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, TransportError> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(err.into())
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            user_agent: Some(format!("habitflow/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

impl HttpClientBuilder {
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// # Errors
    /// Returns `HabitflowError::Config` if the TLS backend cannot be
    /// initialized
    pub fn build(self) -> Result<HttpClient, HabitflowError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|err| HabitflowError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(HttpClient { client })
    }
}
