//! Bearer token payload decoding
//!
//! Tokens are JWTs whose middle segment is base64url-encoded JSON. Only the
//! claims are read; signatures are never verified on the client. Every
//! failure is treated as "expired" by the expiry helpers so a malformed
//! token can never keep a session alive.

use std::sync::Arc;
use std::time::Duration;

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use super::types::DecodedToken;
use crate::time::{Clock, SystemClock};

/// URL-safe alphabet, padded or unpadded input
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Reasons a token payload could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum TokenDecodeError {
    #[error("token has no payload segment")]
    MissingPayload,

    #[error("payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not a valid claims object: {0}")]
    Claims(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<serde_json::Value>,
    #[serde(default)]
    iat: Option<i64>,
    exp: i64,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "type")]
    token_type: Option<String>,
}

impl From<Claims> for DecodedToken {
    fn from(claims: Claims) -> Self {
        let subject = match claims.sub {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Self {
            subject,
            issued_at: claims.iat,
            expires_at: claims.exp,
            email: claims.email,
            token_type: claims.token_type,
        }
    }
}

/// Decodes token claims and answers expiry questions against a [`Clock`]
#[derive(Clone)]
pub struct TokenCodec {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCodec {
    /// Codec reading the system clock
    #[must_use]
    pub fn new() -> Self {
        Self { clock: Arc::new(SystemClock) }
    }

    /// Codec reading an injected clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Decode the claims of `token`, reporting why decoding failed
    ///
    /// # Errors
    /// Returns [`TokenDecodeError`] if the token has fewer than two segments,
    /// the payload is not base64url, or the claims lack a numeric `exp`
    pub fn try_decode(token: &str) -> Result<DecodedToken, TokenDecodeError> {
        let payload = token
            .split('.')
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .ok_or(TokenDecodeError::MissingPayload)?;

        // Tolerate payloads encoded with the standard alphabet
        let normalized: String = payload
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                other => other,
            })
            .collect();

        let bytes = PAYLOAD_ENGINE.decode(normalized.as_bytes())?;
        let claims: Claims = serde_json::from_slice(&bytes)?;
        Ok(claims.into())
    }

    /// Decode the claims of `token`
    ///
    /// Never fails loudly: malformed input is logged and yields `None`.
    #[must_use]
    pub fn decode(&self, token: &str) -> Option<DecodedToken> {
        match Self::try_decode(token) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(error = %e, "Failed to decode access token");
                None
            }
        }
    }

    /// Whether `token` is expired, treating it as expiring `offset_seconds`
    /// early
    ///
    /// Undecodable tokens are reported as expired.
    #[must_use]
    pub fn is_expired(&self, token: &str, offset_seconds: i64) -> bool {
        let Some(decoded) = self.decode(token) else {
            return true;
        };

        let deadline_ms = decoded.expires_at.saturating_sub(offset_seconds).saturating_mul(1000);
        self.clock.millis_since_epoch() >= deadline_ms
    }

    /// Time left before `token` expires, zero if expired or undecodable
    #[must_use]
    pub fn time_until_expiration(&self, token: &str) -> Duration {
        let Some(decoded) = self.decode(token) else {
            return Duration::ZERO;
        };

        let remaining_ms =
            decoded.expires_at.saturating_mul(1000).saturating_sub(self.clock.millis_since_epoch());
        u64::try_from(remaining_ms).map_or(Duration::ZERO, Duration::from_millis)
    }

    /// Absolute expiry of `token`
    #[must_use]
    pub fn expiration_time(&self, token: &str) -> Option<DateTime<Utc>> {
        self.decode(token).and_then(|decoded| decoded.expires_at_utc())
    }

    /// The clock expiry is measured against
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
