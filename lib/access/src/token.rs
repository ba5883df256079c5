//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying the identity claims. They are stateless:
//! verification needs only the signing secret, so a token cannot be revoked
//! before it expires.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tollgate_core::Identity;

use crate::error::TokenError;

/// Default token lifetime in hours (about 5.7 years).
pub const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 50_000;

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    email: String,
    #[serde(rename = "image-url")]
    image_url: String,
    exp: i64,
}

/// A signed bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BearerToken {
    token: String,
    #[serde(skip)]
    expires_at: DateTime<Utc>,
}

impl BearerToken {
    /// Returns the encoded token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Returns when the token expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Consumes the token, returning the encoded string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.token
    }
}

/// Mints and validates bearer tokens with a process-wide secret.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl TokenIssuer {
    /// Creates an issuer for the given secret and token lifetime.
    #[must_use]
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetime,
        }
    }

    /// Returns the lifetime of issued tokens.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a token for `identity` expiring one lifetime from now.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if encoding fails.
    pub fn issue(&self, identity: &Identity) -> Result<BearerToken, TokenError> {
        let expires_at = Utc::now() + self.lifetime;
        let claims = Claims {
            email: identity.email().to_string(),
            image_url: identity.image_url().to_string(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(
            |e| TokenError::Signing {
                reason: e.to_string(),
            },
        )?;

        Ok(BearerToken { token, expires_at })
    }

    /// Verifies a token and returns the identity it carries.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidSignature`] if the signature does not
    /// match, [`TokenError::Expired`] once the expiry has passed, and
    /// [`TokenError::Malformed`] for anything that is not a token of ours.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed {
                    reason: e.to_string(),
                },
            }
        })?;

        Ok(Identity::new(data.claims.email, data.claims.image_url))
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// Extracts the token from an `Authorization` header value.
///
/// Expects format: "Bearer <token>"
#[must_use]
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
