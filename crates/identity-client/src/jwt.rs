//! Access token claim decoding.
//!
//! Only the payload is read; signatures are the service's concern.

use crate::{IdentityError, IdentityResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    exp: i64,
}

/// Expiry (`exp` claim) of a JWT access token.
pub fn token_expiry(token: &str) -> IdentityResult<DateTime<Utc>> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| IdentityError::InvalidToken("token has no payload segment".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| IdentityError::InvalidToken(format!("payload is not base64url: {}", e)))?;

    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| IdentityError::InvalidToken(format!("payload is not valid claims: {}", e)))?;

    Utc.timestamp_opt(claims.exp, 0)
        .single()
        .ok_or_else(|| IdentityError::InvalidToken(format!("exp out of range: {}", claims.exp)))
}
