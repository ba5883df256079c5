//! Centralized server configuration.
//!
//! Configuration is loaded via the `config` crate from an optional file
//! named by `TOLLGATE_CONFIG`, then from `TOLLGATE_`-prefixed environment
//! variables. Nested keys use `__` as the separator, for example
//! `TOLLGATE_SESSION__SECURE_COOKIES=false`.
//!
//! [`ServerConfig::validate`] rejects combinations the gateway cannot run
//! with, so a loaded and validated config is safe to build state from.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use tollgate_core::HttpPolicy;
use url::Url;

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "TOLLGATE_CONFIG";

/// Minimum signing secret length. Cookie key derivation needs 32 bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted lifetime or interval, in seconds (100 years).
pub const MAX_DURATION_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// OAuth2 client identifier registered with the provider.
    pub client_id: String,

    /// OAuth2 client secret.
    pub client_secret: String,

    /// Callback URL registered with the provider, ending in `/oauth2callback`.
    pub redirect_url: String,

    /// Secret used to sign bearer tokens and encrypt session cookies.
    pub signing_secret: String,

    /// Public hostname, used for logging and the landing page.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// TLS certificate (PEM). With `key_path` set the gateway serves HTTPS.
    #[serde(default)]
    pub cert_path: Option<PathBuf>,

    /// TLS private key path. Must be set together with `cert_path`.
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Base URL of the remote authorization datastore.
    #[serde(default)]
    pub auth_datastore_url: Option<String>,

    /// Bearer credential for the authorization datastore.
    #[serde(default)]
    pub auth_datastore_token: Option<String>,

    /// Path to a JSON allow-list mapping emails to tiers.
    #[serde(default)]
    pub auth_file_path: Option<PathBuf>,

    /// Lets unauthenticated callers reach read-only API routes.
    #[serde(default)]
    pub public_read: bool,

    /// Base URL that `/api/*` requests are forwarded to.
    #[serde(default)]
    pub upstream_api_url: Option<String>,

    /// PostgreSQL URL for the flow session store. In-memory when unset.
    #[serde(default)]
    pub flow_store_database_url: Option<String>,

    /// Session and token configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Identity provider endpoints.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Outbound HTTP policy for provider and datastore calls.
    #[serde(default)]
    pub http: HttpPolicy,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of the default session cookie, in seconds.
    #[serde(default = "default_session_max_age_seconds")]
    pub max_age_seconds: i64,

    /// Lifetime of a login flow, in seconds.
    #[serde(default = "default_flow_max_age_seconds")]
    pub flow_max_age_seconds: i64,

    /// Lifetime of issued bearer tokens, in hours.
    #[serde(default = "default_token_lifetime_hours")]
    pub token_lifetime_hours: i64,

    /// Interval between expired flow purges, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

/// Identity provider endpoints. Defaults target Google.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Authorization endpoint.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Token endpoint.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Userinfo endpoint.
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,

    /// Requested scopes.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

/// The authorization backend selected by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthBackendConfig {
    /// Local allow-list file.
    File(PathBuf),
    /// Remote datastore.
    Datastore {
        /// Base URL.
        url: String,
        /// Bearer credential, possibly empty.
        token: String,
    },
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    11000
}

fn default_session_max_age_seconds() -> i64 {
    tollgate_access::session::DEFAULT_SESSION_MAX_AGE_SECONDS
}

fn default_flow_max_age_seconds() -> i64 {
    600
}

fn default_token_lifetime_hours() -> i64 {
    tollgate_access::token::DEFAULT_TOKEN_LIFETIME_HOURS
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_userinfo_url() -> String {
    "https://openidconnect.googleapis.com/v1/userinfo".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: default_session_max_age_seconds(),
            flow_max_age_seconds: default_flow_max_age_seconds(),
            token_lifetime_hours: default_token_lifetime_hours(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            userinfo_url: default_userinfo_url(),
            scopes: default_scopes(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the optional file and the environment, then
    /// validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix("TOLLGATE")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("provider.scopes")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Load {
                details: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing { field });
            }
        }

        if self.signing_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                length: self.signing_secret.len(),
            });
        }

        check_url("redirect_url", &self.redirect_url)?;
        check_url("provider.auth_url", &self.provider.auth_url)?;
        check_url("provider.token_url", &self.provider.token_url)?;
        check_url("provider.userinfo_url", &self.provider.userinfo_url)?;
        if let Some(upstream) = &self.upstream_api_url {
            check_url("upstream_api_url", upstream)?;
        }

        if self.cert_path.is_some() != self.key_path.is_some() {
            return Err(ConfigError::IncompleteTls);
        }

        let cleanup_interval =
            i64::try_from(self.session.cleanup_interval_seconds).unwrap_or(i64::MAX);
        for (field, value, max) in [
            (
                "session.max_age_seconds",
                self.session.max_age_seconds,
                MAX_DURATION_SECONDS,
            ),
            (
                "session.flow_max_age_seconds",
                self.session.flow_max_age_seconds,
                MAX_DURATION_SECONDS,
            ),
            (
                "session.token_lifetime_hours",
                self.session.token_lifetime_hours,
                MAX_DURATION_SECONDS / 3600,
            ),
            (
                "session.cleanup_interval_seconds",
                cleanup_interval,
                MAX_DURATION_SECONDS,
            ),
        ] {
            if value <= 0 {
                return Err(ConfigError::Invalid {
                    field,
                    details: "must be positive".to_string(),
                });
            }
            if value > max {
                return Err(ConfigError::Invalid {
                    field,
                    details: format!("must be at most {}", max),
                });
            }
        }

        self.auth_backend().map(|_| ())
    }

    /// Returns the configured authorization backend.
    ///
    /// # Errors
    ///
    /// Returns an error unless exactly one of `auth_datastore_url` and
    /// `auth_file_path` is set.
    pub fn auth_backend(&self) -> Result<AuthBackendConfig, ConfigError> {
        match (&self.auth_datastore_url, &self.auth_file_path) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingAuthBackends),
            (None, None) => Err(ConfigError::MissingAuthBackend),
            (Some(url), None) => {
                check_url("auth_datastore_url", url)?;
                Ok(AuthBackendConfig::Datastore {
                    url: url.clone(),
                    token: self.auth_datastore_token.clone().unwrap_or_default(),
                })
            }
            (None, Some(path)) => Ok(AuthBackendConfig::File(path.clone())),
        }
    }

    /// Returns true if cookies must carry the Secure attribute.
    ///
    /// TLS material implies the gateway is served over HTTPS.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.session.secure_cookies || self.cert_path.is_some()
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid {
            field,
            details: e.to_string(),
        })
}
