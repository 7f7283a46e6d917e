//! # Habitflow Domain
//!
//! Business domain types and models for the Habitflow client.
//!
//! This crate contains:
//! - API payloads (`User`, login/refresh request and response shapes)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants (storage keys, session timing defaults)
//!
//! ## Architecture
//! - No dependencies on other Habitflow crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
