//! Signed access token issuance and verification.
//!
//! Access tokens are HS256 JWTs carrying `sub`, `iat`, `exp` and any extra claims.
//! They are never stored: a token is valid when its signature checks out and
//! `exp` is still in the future.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Default access token lifetime: 1 hour.
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_millis(3_600_000);

/// Upper bound for any token lifetime: 10 years, in milliseconds.
pub const MAX_TTL_MS: u64 = 315_360_000_000;

/// Convert a configured lifetime, capped at [`MAX_TTL_MS`] so `now + ttl` cannot overflow.
pub(crate) fn bounded_ttl(ttl: Duration) -> TimeDelta {
    let millis = i64::try_from(ttl.as_millis())
        .unwrap_or(i64::MAX)
        .min(MAX_TTL_MS as i64);
    TimeDelta::milliseconds(millis)
}

/// Claim names owned by the codec. Extra claims with these names are dropped.
const RESERVED_CLAIMS: [&str; 3] = ["sub", "iat", "exp"];

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Any additional claims supplied at issue time
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Errors returned by [`TokenCodec`].
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Invalid token")]
    Invalid,
    #[error("Token expired")]
    Expired,
}

/// Issues and verifies access tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: TimeDelta,
}

impl TokenCodec {
    pub fn new(secret: &[u8], access_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl: bounded_ttl(access_ttl),
        }
    }

    /// Issue a signed token for `subject`, valid for the configured lifetime.
    pub fn issue(&self, subject: &str, extra_claims: Map<String, Value>) -> Result<String, TokenError> {
        let now = Utc::now();

        let mut extra = extra_claims;
        for name in RESERVED_CLAIMS {
            extra.remove(name);
        }

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            extra,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// Verify signature and expiry, returning the decoded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        // The library accepts exp == now; a token is already dead at its expiry second.
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }

    /// Verify a token and return its subject.
    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token).map(|claims| claims.sub)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("ttl", &self.ttl).finish()
    }
}
