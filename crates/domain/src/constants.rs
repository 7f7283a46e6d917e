//! Application constants
//!
//! Centralized location for domain-level constants: storage keys shared with
//! the rest of the client and the session timing defaults.

// Durable storage keys. The auth clear only removes the first three.
pub const TOKEN_KEY: &str = "habit_token";
pub const REFRESH_TOKEN_KEY: &str = "habit_refresh_token";
pub const USER_KEY: &str = "habit_user";
pub const THEME_KEY: &str = "habit_theme";
pub const LANGUAGE_KEY: &str = "habit_language";

/// Keys erased by a logout or an unrecoverable refresh failure.
pub const AUTH_KEYS: [&str; 3] = [TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

// Proactive renewal
pub const DEFAULT_RENEW_BEFORE_EXPIRY_MS: u64 = 60_000;
pub const DEFAULT_MIN_RENEWAL_DELAY_MS: u64 = 10_000;

// API
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/v1";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
pub const BEARER_PREFIX: &str = "Bearer ";

// User-facing notices
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please sign in again.";
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error. Check your internet connection.";
