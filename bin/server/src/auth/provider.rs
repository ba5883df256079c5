//! OAuth2 identity provider client.
//!
//! [`IdentityProvider`] is the seam the login flow talks to. The production
//! implementation, [`OAuthProvider`], drives the authorization-code grant
//! with the `oauth2` crate and reads the userinfo endpoint with `reqwest`.

use async_trait::async_trait;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl, basic::BasicClient,
};
use rootcause::prelude::Report;
use std::fmt;
use tollgate_access::{ProviderProfile, ProviderToken, StateToken};
use tollgate_core::HttpPolicy;
use tracing::{instrument, warn};

use crate::config::ServerConfig;

/// Identity provider errors.
#[derive(Debug)]
pub enum ProviderError {
    /// Endpoints or credentials are unusable.
    Configuration { details: String },
    /// The authorization code could not be exchanged.
    Exchange { details: String },
    /// The profile could not be fetched or decoded.
    Profile { details: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => {
                write!(f, "invalid provider configuration: {}", details)
            }
            Self::Exchange { details } => write!(f, "code exchange failed: {}", details),
            Self::Profile { details } => write!(f, "profile fetch failed: {}", details),
        }
    }
}

impl std::error::Error for ProviderError {}

/// An external OAuth2 identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the URL the browser is sent to, carrying `state`.
    fn authorization_url(&self, state: &StateToken) -> String;

    /// Exchanges an authorization code for a provider token.
    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, Report<ProviderError>>;

    /// Fetches the user's profile with a provider token.
    async fn fetch_profile(
        &self,
        token: &ProviderToken,
    ) -> Result<ProviderProfile, Report<ProviderError>>;
}

/// Authorization-code client for a standard OAuth2 provider.
#[derive(Clone)]
pub struct OAuthProvider {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    userinfo_url: String,
    scopes: Vec<Scope>,
    http: reqwest::Client,
    policy: HttpPolicy,
}

impl OAuthProvider {
    /// Creates a provider client from server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if an endpoint is not a
    /// valid URL or the HTTP client cannot be built.
    pub fn new(config: &ServerConfig) -> Result<Self, Report<ProviderError>> {
        let invalid = |what: &str, e: &dyn fmt::Display| ProviderError::Configuration {
            details: format!("invalid {}: {}", what, e),
        };

        let auth_url = AuthUrl::new(config.provider.auth_url.clone())
            .map_err(|e| invalid("auth URL", &e))?;
        let token_url = TokenUrl::new(config.provider.token_url.clone())
            .map_err(|e| invalid("token URL", &e))?;
        let redirect_url = RedirectUrl::new(config.redirect_url.clone())
            .map_err(|e| invalid("redirect URL", &e))?;

        // Following redirects during the token exchange is an SSRF vector.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.http.timeout())
            .build()
            .map_err(|e| invalid("HTTP client", &e))?;

        Ok(Self {
            client_id: ClientId::new(config.client_id.clone()),
            client_secret: ClientSecret::new(config.client_secret.clone()),
            auth_url,
            token_url,
            redirect_url,
            userinfo_url: config.provider.userinfo_url.clone(),
            scopes: config.provider.scopes.iter().cloned().map(Scope::new).collect(),
            http,
            policy: config.http,
        })
    }

    async fn fetch_profile_once(&self, token: &ProviderToken) -> Result<ProviderProfile, String> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(token.access_token())
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;

        response
            .json::<ProviderProfile>()
            .await
            .map_err(|e| format!("undecodable profile: {}", e))
    }
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn authorization_url(&self, state: &StateToken) -> String {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let state = state.as_str().to_string();
        let (url, _) = client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned())
            .add_extra_param("access_type", "online")
            .url();

        url.to_string()
    }

    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, Report<ProviderError>> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        // Codes are single-use, so the exchange is never retried.
        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| ProviderError::Exchange {
                details: e.to_string(),
            })?;

        Ok(ProviderToken::from_expires_in(
            token.access_token().secret().clone(),
            token.expires_in(),
        ))
    }

    #[instrument(skip_all)]
    async fn fetch_profile(
        &self,
        token: &ProviderToken,
    ) -> Result<ProviderProfile, Report<ProviderError>> {
        let mut last_error = String::new();
        for attempt in 1..=self.policy.attempts() {
            match self.fetch_profile_once(token).await {
                Ok(profile) => return Ok(profile),
                Err(details) => {
                    warn!(attempt, error = %details, "Profile fetch failed");
                    last_error = details;
                }
            }
        }

        Err(ProviderError::Profile {
            details: last_error,
        }
        .into())
    }
}

impl fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthProvider")
            .field("client_id", &self.client_id.as_str())
            .field("auth_url", &self.auth_url.as_str())
            .field("userinfo_url", &self.userinfo_url)
            .finish_non_exhaustive()
    }
}
