//! Flow sessions and the long-lived session payload.
//!
//! A [`FlowSession`] correlates one login attempt's CSRF state token with
//! the destination the user asked for. It lives for minutes and is consumed
//! by the first callback that presents its token.
//!
//! A [`SessionPayload`] is what the default session holds after a
//! successful login: the projected identity and the provider token. It is
//! only honored while the provider token is still valid.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tollgate_core::Identity;

/// Default session lifetime: 30 days.
pub const DEFAULT_SESSION_MAX_AGE_SECONDS: i64 = 86_400 * 30;

/// Opaque, unguessable token naming a flow session.
///
/// The same value is sent to the provider as the OAuth2 `state` parameter.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateToken(String);

impl StateToken {
    /// Wraps an already-generated token value.
    #[must_use]
    pub fn new(token: String) -> Self {
        Self(token)
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// State tokens are bearer secrets for the duration of a login attempt.
impl fmt::Debug for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "StateToken({prefix}…)")
    }
}

impl From<String> for StateToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StateToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Server-held state for a single login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSession {
    state: StateToken,
    redirect: String,
    created_at: DateTime<Utc>,
    max_age: Duration,
}

impl FlowSession {
    /// Creates a flow session starting now.
    ///
    /// `redirect` must already have passed redirect validation.
    #[must_use]
    pub fn new(state: StateToken, redirect: String, max_age: Duration) -> Self {
        Self {
            state,
            redirect,
            created_at: Utc::now(),
            max_age,
        }
    }

    /// Reconstructs a flow session from stored fields.
    #[must_use]
    pub fn with_all_fields(
        state: StateToken,
        redirect: String,
        created_at: DateTime<Utc>,
        max_age: Duration,
    ) -> Self {
        Self {
            state,
            redirect,
            created_at,
            max_age,
        }
    }

    /// Returns the state token.
    #[must_use]
    pub fn state(&self) -> &StateToken {
        &self.state
    }

    /// Returns the validated post-login destination.
    #[must_use]
    pub fn redirect(&self) -> &str {
        &self.redirect
    }

    /// Returns when the flow started.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the flow's maximum age.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Returns when the flow expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + self.max_age
    }

    /// Returns true if the flow has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }
}

/// The access token returned by the provider's token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderToken {
    access_token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl ProviderToken {
    /// Creates a provider token.
    #[must_use]
    pub fn new(access_token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token,
            expires_at,
        }
    }

    /// Creates a provider token from an `expires_in` lifetime reported now.
    #[must_use]
    pub fn from_expires_in(access_token: String, expires_in: Option<std::time::Duration>) -> Self {
        let expires_at = expires_in
            .and_then(|d| Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        Self::new(access_token, expires_at)
    }

    /// Returns the access token secret.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the token's expiry, if the provider reported one.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the token is present and not expired.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && self.expires_at.is_none_or(|exp| Utc::now() < exp)
    }
}

impl fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Typed contents of the default session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    identity: Identity,
    provider_token: ProviderToken,
    created_at: DateTime<Utc>,
}

impl SessionPayload {
    /// Creates a payload for a freshly authenticated user.
    #[must_use]
    pub fn new(identity: Identity, provider_token: ProviderToken) -> Self {
        Self {
            identity,
            provider_token,
            created_at: Utc::now(),
        }
    }

    /// Returns the authenticated identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the provider token.
    #[must_use]
    pub fn provider_token(&self) -> &ProviderToken {
        &self.provider_token
    }

    /// Returns when the user logged in.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if the session may be honored.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.provider_token.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> StateToken {
        StateToken::new("state_test_123".to_string())
    }

    #[test]
    fn state_token_display() {
        assert_eq!(test_state().to_string(), "state_test_123");
    }

    #[test]
    fn state_token_debug_is_truncated() {
        let debug = format!("{:?}", test_state());
        assert!(!debug.contains("state_test_123"));
    }

    #[test]
    fn new_flow_session_has_correct_fields() {
        let before = Utc::now();
        let flow = FlowSession::new(test_state(), "/reports".to_string(), Duration::minutes(10));
        let after = Utc::now();

        assert_eq!(flow.state(), &test_state());
        assert_eq!(flow.redirect(), "/reports");
        assert!(flow.created_at() >= before);
        assert!(flow.created_at() <= after);
        assert_eq!(flow.expires_at() - flow.created_at(), Duration::minutes(10));
        assert!(!flow.is_expired());
    }

    #[test]
    fn flow_session_expiration() {
        let flow = FlowSession::new(test_state(), "/".to_string(), Duration::seconds(-1));
        assert!(flow.is_expired());
    }

    #[test]
    fn provider_token_without_expiry_is_valid() {
        let token = ProviderToken::new("ya29.token".to_string(), None);
        assert!(token.is_valid());
    }

    #[test]
    fn provider_token_expired_is_invalid() {
        let token = ProviderToken::new(
            "ya29.token".to_string(),
            Some(Utc::now() - Duration::seconds(1)),
        );
        assert!(!token.is_valid());
    }

    #[test]
    fn empty_provider_token_is_invalid() {
        let token = ProviderToken::new(String::new(), None);
        assert!(!token.is_valid());
    }

    #[test]
    fn provider_token_from_expires_in() {
        let token = ProviderToken::from_expires_in(
            "ya29.token".to_string(),
            Some(std::time::Duration::from_secs(3600)),
        );
        assert!(token.expires_at().is_some());
        assert!(token.is_valid());
    }

    #[test]
    fn provider_token_debug_hides_secret() {
        let token = ProviderToken::new("ya29.secret".to_string(), None);
        assert!(!format!("{token:?}").contains("ya29.secret"));
    }

    #[test]
    fn session_payload_validity_follows_provider_token() {
        let identity = Identity::new("user@example.org", "");
        let valid = SessionPayload::new(
            identity.clone(),
            ProviderToken::new("tok".to_string(), Some(Utc::now() + Duration::hours(1))),
        );
        assert!(valid.is_valid());

        let stale = SessionPayload::new(
            identity,
            ProviderToken::new("tok".to_string(), Some(Utc::now() - Duration::hours(1))),
        );
        assert!(!stale.is_valid());
    }

    #[test]
    fn session_payload_serialization_roundtrip() {
        let payload = SessionPayload::new(
            Identity::new("user@example.org", "https://img.example.org/u.png"),
            ProviderToken::new("tok".to_string(), None),
        );

        let json = serde_json::to_string(&payload).expect("serialize");
        let parsed: SessionPayload = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(payload, parsed);
    }
}
