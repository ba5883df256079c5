//! Authentication and authorization for the gateway.
//!
//! This module provides:
//! - The OAuth2 login flow (`/login`, `/oauth2callback`, `/logout`)
//! - Server-held flow sessions, in memory or in PostgreSQL
//! - The encrypted default session cookie and bearer token resolution
//! - Tier authorization middleware for protected routes
//!
//! # Authorization Model
//!
//! Authentication answers *who*: an [`Identity`](tollgate_core::Identity)
//! resolved from a bearer token or the session cookie. Authorization answers
//! *how much*: the configured [`Authorizer`] maps that identity's email to a
//! [`Tier`](tollgate_core::Tier), checked on every guarded request so grant
//! changes apply immediately.

pub mod db;
pub mod flow_store;
pub mod middleware;
pub mod provider;
pub mod routes;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;
use tollgate_access::TokenIssuer;
use tollgate_authz::Authorizer;

use crate::api::Upstream;
use crate::config::ServerConfig;
use flow_store::FlowStore;
use provider::IdentityProvider;

pub use middleware::{AuthRejection, TierGuard, require_method_tier, require_tier};
pub use routes::{callback, login, logout, profile, token};
pub use session::CurrentIdentity;

/// Settings fixed at startup that shape cookies and flows.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Public hostname.
    pub hostname: String,
    /// Lets unauthenticated callers reach read-only API routes.
    pub public_read: bool,
    /// Whether cookies carry the Secure attribute.
    pub secure_cookies: bool,
    /// Default session cookie lifetime.
    pub session_max_age: time::Duration,
    /// Login flow lifetime.
    pub flow_max_age: chrono::Duration,
}

impl GatewaySettings {
    /// Derives settings from validated configuration.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            hostname: config.hostname.clone(),
            public_read: config.public_read,
            secure_cookies: config.secure_cookies(),
            session_max_age: time::Duration::seconds(config.session.max_age_seconds),
            flow_max_age: chrono::Duration::seconds(config.session.flow_max_age_seconds),
        }
    }
}

/// Shared application state.
///
/// Cheap to clone: every component is behind an `Arc` or is a small key.
#[derive(Clone)]
pub struct AppState {
    /// Identity provider for the login flow.
    pub provider: Arc<dyn IdentityProvider>,
    /// Bearer token issuer and verifier.
    pub tokens: Arc<TokenIssuer>,
    /// Tier authorization backend.
    pub authorizer: Arc<Authorizer>,
    /// In-progress login flows.
    pub flows: Arc<dyn FlowStore>,
    /// Startup settings.
    pub settings: Arc<GatewaySettings>,
    /// Upstream API that `/api/*` is forwarded to, if any.
    pub upstream: Option<Upstream>,
    cookie_key: Key,
}

impl AppState {
    /// Creates a new application state.
    ///
    /// The cookie encryption key is derived from `signing_secret`, which
    /// must be at least 32 bytes long.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        tokens: TokenIssuer,
        authorizer: Authorizer,
        flows: Arc<dyn FlowStore>,
        settings: GatewaySettings,
        signing_secret: &[u8],
    ) -> Self {
        Self {
            provider,
            tokens: Arc::new(tokens),
            authorizer: Arc::new(authorizer),
            flows,
            settings: Arc::new(settings),
            upstream: None,
            cookie_key: Key::derive_from(signing_secret),
        }
    }

    /// Forwards `/api/*` to `upstream`.
    #[must_use]
    pub fn with_upstream(mut self, upstream: Upstream) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Returns the cookie encryption key.
    pub fn cookie_key(&self) -> &Key {
        &self.cookie_key
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
