//! Habitflow API access
//!
//! - [`RequestGateway`]: authenticated calls with the 401 → refresh → retry
//!   cycle
//! - [`HttpAuthClient`]: the `/auth/*` endpoints the session core depends on
//! - [`ApiError`]: gateway failures, classified by [`ApiErrorCategory`]

pub mod auth;
pub mod client;
pub mod errors;
pub mod request;

pub use auth::HttpAuthClient;
pub use client::RequestGateway;
pub use errors::{ApiError, ApiErrorCategory};
pub use request::{ApiRequest, ApiResponse};
