//! Mock implementations of the auth seams
//!
//! Provides mock objects for testing purposes.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use habitflow_domain::{LoginRequest, LoginResponse, Verify2faRequest};
use parking_lot::Mutex;

use crate::auth::{AuthClientError, AuthClientTrait, Notice, Notifier, RefreshedTokens};
use crate::storage::{KeyValueStore, StorageError, StorageResult};

type Scripted<T> = Mutex<VecDeque<Result<T, AuthClientError>>>;

fn unscripted<T>(operation: &str) -> Result<T, AuthClientError> {
    Err(AuthClientError::Network(format!("MockAuthClient: no {operation} response configured")))
}

/// Scriptable [`AuthClientTrait`] that records every call
///
/// Each operation answers from a queue of one-shot results first, then from
/// a repeating default. Unconfigured operations fail with a network error.
///
/// # Examples
///
/// ```
/// use habitflow_common::auth::{AuthClientTrait, RefreshedTokens};
/// use habitflow_common::testing::MockAuthClient;
///
/// # tokio_test::block_on(async {
/// let client = MockAuthClient::new().with_refresh_result(Ok(RefreshedTokens::new("t2")));
///
/// let tokens = client.refresh("r1").await.unwrap();
/// assert_eq!(tokens.access_token, "t2");
/// assert_eq!(client.refresh_count(), 1);
/// assert_eq!(client.last_refresh_token().as_deref(), Some("r1"));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MockAuthClient {
    refresh_queue: Scripted<RefreshedTokens>,
    refresh_default: Mutex<Option<Result<RefreshedTokens, AuthClientError>>>,
    refresh_delay: Mutex<Option<Duration>>,
    login_queue: Scripted<LoginResponse>,
    verify_queue: Scripted<LoginResponse>,
    logout_result: Mutex<Option<Result<(), AuthClientError>>>,

    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    refresh_tokens_seen: Mutex<Vec<String>>,
    login_requests: Mutex<Vec<LoginRequest>>,
    verify_requests: Mutex<Vec<Verify2faRequest>>,
}

impl MockAuthClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every refresh with `result`
    #[must_use]
    pub fn with_refresh_result(self, result: Result<RefreshedTokens, AuthClientError>) -> Self {
        *self.refresh_default.lock() = Some(result);
        self
    }

    /// Hold every refresh for `delay` before answering
    #[must_use]
    pub fn with_refresh_delay(self, delay: Duration) -> Self {
        *self.refresh_delay.lock() = Some(delay);
        self
    }

    #[must_use]
    pub fn with_login_response(self, result: Result<LoginResponse, AuthClientError>) -> Self {
        self.push_login_response(result);
        self
    }

    #[must_use]
    pub fn with_verify_response(self, result: Result<LoginResponse, AuthClientError>) -> Self {
        self.verify_queue.lock().push_back(result);
        self
    }

    #[must_use]
    pub fn with_logout_result(self, result: Result<(), AuthClientError>) -> Self {
        *self.logout_result.lock() = Some(result);
        self
    }

    /// Queue a one-shot refresh result, used before the default
    pub fn push_refresh_result(&self, result: Result<RefreshedTokens, AuthClientError>) {
        self.refresh_queue.lock().push_back(result);
    }

    pub fn push_login_response(&self, result: Result<LoginResponse, AuthClientError>) {
        self.login_queue.lock().push_back(result);
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.refresh_tokens_seen.lock().last().cloned()
    }

    pub fn login_requests(&self) -> Vec<LoginRequest> {
        self.login_requests.lock().clone()
    }

    pub fn verify_requests(&self) -> Vec<Verify2faRequest> {
        self.verify_requests.lock().clone()
    }
}

#[async_trait]
impl AuthClientTrait for MockAuthClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthClientError> {
        self.login_requests.lock().push(request.clone());
        let next = self.login_queue.lock().pop_front();
        next.unwrap_or_else(|| unscripted("login"))
    }

    async fn verify_two_factor(
        &self,
        request: &Verify2faRequest,
    ) -> Result<LoginResponse, AuthClientError> {
        self.verify_requests.lock().push(request.clone());
        let next = self.verify_queue.lock().pop_front();
        next.unwrap_or_else(|| unscripted("verify-2fa"))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, AuthClientError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_tokens_seen.lock().push(refresh_token.to_string());

        let delay = *self.refresh_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.refresh_queue.lock().pop_front();
        queued
            .or_else(|| self.refresh_default.lock().clone())
            .unwrap_or_else(|| unscripted("refresh"))
    }

    async fn logout(
        &self,
        _access_token: Option<&str>,
        _refresh_token: Option<&str>,
    ) -> Result<(), AuthClientError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_result.lock().clone().unwrap_or(Ok(()))
    }
}

/// Notifier that keeps every notice for later assertions
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices.lock().iter().map(|n| n.message.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.notices.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Store whose reads find nothing and whose writes always fail
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

impl FailingStore {
    fn failure() -> StorageError {
        StorageError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"))
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(Self::failure())
    }

    fn remove(&self, _key: &str) -> StorageResult<()> {
        Err(Self::failure())
    }

    fn clear(&self) -> StorageResult<()> {
        Err(Self::failure())
    }
}
