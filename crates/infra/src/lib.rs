//! # Habitflow Infrastructure
//!
//! I/O-facing implementations around the session core in
//! `habitflow-common`.
//!
//! This crate contains:
//! - The reqwest transport and the `/auth/*` client
//! - The request gateway that refreshes on 401 and retries once
//! - The auth service (login, two-factor, logout, profile, access check)
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements `AuthClientTrait` from `habitflow-common`
//! - Depends on `habitflow-domain` and `habitflow-common`
//! - [`AppContext`] wires the pieces together

pub mod api;
pub mod config;
pub mod context;
pub mod http;
pub mod observability;
pub mod services;

// Re-export commonly used items
pub use api::{ApiError, ApiErrorCategory, ApiRequest, ApiResponse, HttpAuthClient, RequestGateway};
pub use context::AppContext;
pub use http::{HttpClient, HttpClientBuilder, TransportError};
pub use observability::{init_tracing, LogFormat};
pub use services::{AccessDecision, AuthService, AuthServiceError, LoginOutcome};
