//! Service layer implementations.
//!
//! Services orchestrate the session core and the API for the UI.

pub mod auth_service;

pub use auth_service::{AccessDecision, AuthService, AuthServiceError, LoginOutcome};
