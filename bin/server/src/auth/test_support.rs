//! Fixtures shared by the server's unit tests.

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header::SET_COOKIE},
};
use axum_extra::extract::cookie::Cookie;
use rootcause::prelude::Report;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tollgate_access::{ProviderProfile, ProviderToken, StateToken, TokenIssuer};
use tollgate_authz::{Authorizer, FileAuthorizer};
use tollgate_core::{HttpPolicy, Identity, Tier};
use tower::ServiceExt;

use super::flow_store::MemoryFlowStore;
use super::provider::{IdentityProvider, ProviderError};
use super::{AppState, GatewaySettings};
use crate::config::{ProviderConfig, ServerConfig, SessionConfig};

pub const TEST_SECRET: &[u8] = b"test-signing-secret-that-is-long-enough-for-keys";

/// The only authorization code [`FakeProvider`] accepts.
pub const GOOD_CODE: &str = "good-code";
/// The email [`FakeProvider`] logs everyone in as.
pub const USER_EMAIL: &str = "bob@example.org";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        client_id: "test-client".to_string(),
        client_secret: "test-client-secret".to_string(),
        redirect_url: "http://localhost:11000/oauth2callback".to_string(),
        signing_secret: String::from_utf8_lossy(TEST_SECRET).into_owned(),
        hostname: "localhost".to_string(),
        port: 11000,
        cert_path: None,
        key_path: None,
        auth_datastore_url: None,
        auth_datastore_token: None,
        auth_file_path: Some(PathBuf::from("authorized.json")),
        public_read: false,
        upstream_api_url: None,
        flow_store_database_url: None,
        session: SessionConfig {
            secure_cookies: false,
            ..SessionConfig::default()
        },
        provider: ProviderConfig::default(),
        http: HttpPolicy::default(),
    }
}

pub fn test_settings() -> GatewaySettings {
    GatewaySettings::from_config(&test_config())
}

/// Provider double: accepts [`GOOD_CODE`] and reports [`USER_EMAIL`].
pub struct FakeProvider;

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(&self, state: &StateToken) -> String {
        format!("https://provider.test/auth?state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, Report<ProviderError>> {
        if code == GOOD_CODE {
            Ok(ProviderToken::new("provider-access".to_string(), None))
        } else {
            Err(ProviderError::Exchange {
                details: "invalid_grant".to_string(),
            }
            .into())
        }
    }

    async fn fetch_profile(
        &self,
        _token: &ProviderToken,
    ) -> Result<ProviderProfile, Report<ProviderError>> {
        serde_json::from_value(serde_json::json!({
            "sub": "1234",
            "email": USER_EMAIL,
            "picture": "https://img.example.org/bob.png"
        }))
        .map_err(|e| {
            ProviderError::Profile {
                details: e.to_string(),
            }
            .into()
        })
    }
}

pub fn file_authorizer(grants: &[(&str, Tier)]) -> Authorizer {
    FileAuthorizer::from_grants(
        grants
            .iter()
            .map(|(email, tier)| ((*email).to_string(), *tier)),
    )
    .into()
}

pub fn test_state_with(authorizer: Authorizer) -> (AppState, Arc<MemoryFlowStore>) {
    test_state_with_settings(authorizer, test_settings())
}

pub fn test_state_with_settings(
    authorizer: Authorizer,
    settings: GatewaySettings,
) -> (AppState, Arc<MemoryFlowStore>) {
    let flows = Arc::new(MemoryFlowStore::new());
    let state = AppState::new(
        Arc::new(FakeProvider),
        TokenIssuer::new(TEST_SECRET, chrono::Duration::hours(1)),
        authorizer,
        flows.clone(),
        settings,
        TEST_SECRET,
    );
    (state, flows)
}

/// Returns an `Authorization` header value carrying a fresh token.
pub fn bearer_for(state: &AppState, email: &str) -> String {
    let token = state
        .tokens
        .issue(&Identity::new(email, ""))
        .expect("issue token");
    format!("Bearer {}", token.as_str())
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("infallible")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Minimal browser cookie store: applies `Set-Cookie` and renders `Cookie`.
#[derive(Debug, Default, Clone)]
pub struct CookieStore {
    cookies: BTreeMap<String, String>,
}

impl CookieStore {
    pub fn absorb(&mut self, response: &Response<Body>) {
        for value in response.headers().get_all(SET_COOKIE) {
            let Some(cookie) = value.to_str().ok().and_then(|v| Cookie::parse(v).ok()) else {
                continue;
            };
            if cookie.max_age() == Some(time::Duration::ZERO) {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies
                    .insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.cookies.keys().map(String::as_str).collect()
    }

    pub fn header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn get(&self, uri: &str) -> Request<Body> {
        self.request("GET", uri)
    }

    pub fn request(&self, method: &str, uri: &str) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if !self.cookies.is_empty() {
            builder = builder.header("cookie", self.header());
        }
        builder.body(Body::empty()).expect("request")
    }
}
