//! Request and response values carried through the gateway
//!
//! An [`ApiRequest`] is a plain description that can be sent more than once,
//! which the 401 retry needs. Bodies are buffered JSON.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::ApiError;

/// A request relative to the API base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path appended to the base URL, e.g. `/habits`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Skip the bearer token and never trigger a refresh
    pub anonymous: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            anonymous: false,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    ///
    /// # Errors
    /// Returns `ApiError::Decode` if `body` cannot be serialized
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Decode(format!("Failed to serialize body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Mark as a public endpoint (login, register, password reset)
    #[must_use]
    pub const fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

/// A response with a success status
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// Deserialize the body; 204/205 and empty bodies read as JSON `null`
    ///
    /// # Errors
    /// Returns `ApiError::Decode` if the body does not match `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let no_content = self.status == StatusCode::NO_CONTENT
            || self.status == StatusCode::RESET_CONTENT
            || self.body.trim().is_empty();

        if no_content {
            return serde_json::from_value(serde_json::Value::Null).map_err(|_| {
                ApiError::Decode(format!(
                    "No content response ({}), but response type cannot be deserialized from empty body",
                    self.status.as_u16()
                ))
            });
        }

        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::Decode(format!("Failed to parse response: {e}")))
    }
}
