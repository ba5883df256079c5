//! tollgate web gateway.
//!
//! This crate serves the OAuth2 login flow, the session and token
//! endpoints, and the tier-guarded `/api` surface in front of an upstream
//! API.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod layers;

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use axum_server::tls_rustls::RustlsConfig;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tollgate_access::TokenIssuer;
use tollgate_authz::{Authorizer, DatastoreAuthorizer, FileAuthorizer};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::api::Upstream;
use crate::auth::{
    AppState, GatewaySettings,
    db::PgFlowStore,
    flow_store::{FlowStore, MemoryFlowStore},
    provider::OAuthProvider,
};
use crate::config::{AuthBackendConfig, ServerConfig};
use crate::error::StartupError;

/// Builds the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::landing))
        .route("/login", get(auth::login))
        .route("/oauth2callback", get(auth::callback))
        .route("/logout", post(auth::logout))
        .route("/profile", get(auth::profile))
        .route("/token", get(auth::token))
        .nest("/api", api::router(&state))
        .layer(from_fn(layers::access_log))
        .layer(from_fn(layers::redirect_www))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Assembles application state from validated configuration.
///
/// # Errors
///
/// Returns an error if a backend cannot be built or the flow store
/// database cannot be reached.
pub async fn build_state(config: &ServerConfig) -> Result<AppState, StartupError> {
    let authorizer: Authorizer = match config.auth_backend()? {
        AuthBackendConfig::File(path) => FileAuthorizer::load(&path)
            .map_err(|e| StartupError::Authorization {
                details: e.to_string(),
            })?
            .into(),
        AuthBackendConfig::Datastore { url, token } => {
            DatastoreAuthorizer::new(&url, token, config.http)
                .map_err(|e| StartupError::Authorization {
                    details: e.to_string(),
                })?
                .into()
        }
    };
    tracing::info!(backend = authorizer.kind(), "Configured authorization backend");

    let provider = OAuthProvider::new(config).map_err(|e| StartupError::Provider {
        details: e.to_string(),
    })?;

    let flows: Arc<dyn FlowStore> = match &config.flow_store_database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .map_err(|e| StartupError::Database {
                    details: e.to_string(),
                })?;

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StartupError::Database {
                    details: e.to_string(),
                })?;
            Arc::new(PgFlowStore::new(pool))
        }
        None => Arc::new(MemoryFlowStore::new()),
    };

    let tokens = TokenIssuer::new(
        config.signing_secret.as_bytes(),
        chrono::Duration::hours(config.session.token_lifetime_hours),
    );

    let state = AppState::new(
        Arc::new(provider),
        tokens,
        authorizer,
        flows,
        GatewaySettings::from_config(config),
        config.signing_secret.as_bytes(),
    );

    match &config.upstream_api_url {
        Some(url) => {
            let upstream = Upstream::new(url, config.http).map_err(|details| {
                StartupError::Config(error::ConfigError::Invalid {
                    field: "upstream_api_url",
                    details,
                })
            })?;
            Ok(state.with_upstream(upstream))
        }
        None => Ok(state),
    }
}

/// Loads the TLS certificate and key when both are configured.
///
/// Returns `None` for plain HTTP.
///
/// # Errors
///
/// Returns an error if either PEM file cannot be read or parsed.
pub async fn load_tls(config: &ServerConfig) -> Result<Option<RustlsConfig>, StartupError> {
    let (Some(cert), Some(key)) = (&config.cert_path, &config.key_path) else {
        return Ok(None);
    };

    // Installing twice fails harmlessly; the first provider stays.
    let _ = rustls::crypto::ring::default_provider().install_default();

    RustlsConfig::from_pem_file(cert, key)
        .await
        .map(Some)
        .map_err(|e| StartupError::Tls {
            details: format!("{} / {}: {}", cert.display(), key.display(), e),
        })
}
