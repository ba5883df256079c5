//! Error types for the access crate.
//!
//! - `RedirectError`: a post-login destination was rejected
//! - `TokenError`: bearer token issuance or verification failed

use std::fmt;

/// A caller-supplied redirect was rejected.
///
/// The error still carries the safe default destination so callers can
/// log or display it, but a rejected redirect must abort the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectError {
    /// The path could not be parsed as a URL reference.
    Invalid { fallback: String, reason: String },
    /// The path is absolute or otherwise leaves this origin.
    OffOrigin { fallback: String },
}

impl RedirectError {
    /// Returns the safe default destination.
    #[must_use]
    pub fn fallback(&self) -> &str {
        match self {
            Self::Invalid { fallback, .. } | Self::OffOrigin { fallback } => fallback,
        }
    }
}

impl fmt::Display for RedirectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { reason, .. } => write!(f, "invalid redirect URL: {reason}"),
            Self::OffOrigin { .. } => write!(f, "redirect URL must not be absolute"),
        }
    }
}

impl std::error::Error for RedirectError {}

/// Errors from bearer token operations.
///
/// Every verification failure means "unauthenticated"; the variants only
/// exist so logs can say why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token is not a well-formed signed token for this gateway.
    Malformed { reason: String },
    /// The token's signature does not match its contents.
    InvalidSignature,
    /// The token's expiry has passed.
    Expired,
    /// Signing a new token failed.
    Signing { reason: String },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(f, "malformed token: {reason}"),
            Self::InvalidSignature => write!(f, "token signature is invalid"),
            Self::Expired => write!(f, "token has expired"),
            Self::Signing { reason } => write!(f, "failed to sign token: {reason}"),
        }
    }
}

impl std::error::Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_error_keeps_fallback() {
        let err = RedirectError::OffOrigin {
            fallback: "/profile".to_string(),
        };
        assert_eq!(err.fallback(), "/profile");
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn token_error_malformed_display() {
        let err = TokenError::Malformed {
            reason: "InvalidToken".to_string(),
        };
        assert!(err.to_string().contains("malformed"));
        assert!(err.to_string().contains("InvalidToken"));
    }

    #[test]
    fn token_error_expired_display() {
        assert!(TokenError::Expired.to_string().contains("expired"));
    }
}
