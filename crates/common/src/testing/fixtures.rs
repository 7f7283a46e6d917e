//! Test fixture generators
//!
//! Deterministic tokens and payloads. Tokens are unsigned: the client never
//! verifies signatures, so the third segment is a fixed placeholder.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use habitflow_domain::{LoginResponse, User};
use serde_json::json;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Build a token whose payload is `claims`
///
/// # Examples
///
/// ```
/// use habitflow_common::auth::TokenCodec;
/// use habitflow_common::testing::jwt_with_claims;
///
/// let token = jwt_with_claims(&serde_json::json!({ "sub": 1, "exp": 2_000_000_000 }));
/// assert_eq!(TokenCodec::try_decode(&token).unwrap().expires_at, 2_000_000_000);
/// ```
#[must_use]
pub fn jwt_with_claims(claims: &serde_json::Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(HEADER),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
    )
}

/// Access token for user 1 expiring at `exp` (Unix seconds)
#[must_use]
pub fn jwt_expiring_at(exp: i64) -> String {
    jwt_with_claims(&json!({
        "sub": 1,
        "email": "ana@example.com",
        "type": "access",
        "exp": exp,
    }))
}

/// A verified, active user with no settings
#[must_use]
pub fn sample_user() -> User {
    User {
        id: 1,
        email: "ana@example.com".to_string(),
        full_name: "Ana Ruiz".to_string(),
        profile_picture: None,
        is_email_verified: true,
        is_active: true,
        preferred_language: None,
        settings: None,
        created_at: None,
        updated_at: None,
    }
}

/// Login response in the access + refresh shape
#[must_use]
pub fn login_response(access_token: &str, refresh_token: &str) -> LoginResponse {
    LoginResponse {
        message: "Login successful".to_string(),
        user: Some(sample_user()),
        access_token: Some(access_token.to_string()),
        refresh_token: Some(refresh_token.to_string()),
        ..LoginResponse::default()
    }
}

/// Login response in the legacy single-token shape
#[must_use]
pub fn legacy_login_response(token: &str) -> LoginResponse {
    LoginResponse {
        message: "Login successful".to_string(),
        user: Some(sample_user()),
        token: Some(token.to_string()),
        ..LoginResponse::default()
    }
}

/// Login response asking for a second factor
#[must_use]
pub fn two_factor_response(user_id: i64) -> LoginResponse {
    LoginResponse {
        requires_2fa: true,
        message: "Verification code sent".to_string(),
        user_id: Some(user_id),
        email: Some("ana@example.com".to_string()),
        ..LoginResponse::default()
    }
}
