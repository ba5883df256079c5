//! Tier authorization middleware for Axum.
//!
//! Guards run after routing. A guard resolves the caller's identity, asks
//! the configured authorizer whether that identity holds the required tier,
//! and on success passes the [`Identity`] down in request extensions. The
//! identity is also copied onto the response so the access log can name the
//! user.

use axum::{
    Json,
    extract::{OriginalUri, Request, State},
    http::{
        Method, StatusCode,
        header::{ACCEPT, AUTHORIZATION},
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tollgate_core::{Identity, Tier};
use tracing::{error, info};

use super::{AppState, session::resolve_identity};

/// State for [`require_tier`]: which tier a group of routes needs.
#[derive(Clone)]
pub struct TierGuard {
    state: AppState,
    tier: Tier,
}

impl TierGuard {
    /// Creates a guard requiring `tier`.
    pub fn new(state: AppState, tier: Tier) -> Self {
        Self { state, tier }
    }
}

/// Requires the caller to hold the guard's tier.
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn require_tier(
    State(guard): State<TierGuard>,
    request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    authorize(&guard.state, guard.tier, request, next).await
}

/// Requires a tier chosen by request method.
///
/// Safe methods need [`Tier::Read`], or nothing in public-read mode. Every
/// other method needs [`Tier::ReadWrite`].
pub async fn require_method_tier(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let tier = method_tier(request.method(), state.settings.public_read);
    authorize(&state, tier, request, next).await
}

fn method_tier(method: &Method, public_read: bool) -> Tier {
    match *method {
        Method::GET | Method::HEAD | Method::OPTIONS if public_read => Tier::NoAuth,
        Method::GET | Method::HEAD | Method::OPTIONS => Tier::Read,
        _ => Tier::ReadWrite,
    }
}

async fn authorize(
    state: &AppState,
    tier: Tier,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    if tier == Tier::NoAuth {
        return Ok(next.run(request).await);
    }

    let Some(identity) = resolve_identity(request.headers(), state) else {
        return Err(AuthRejection::not_authenticated(&request));
    };

    match state.authorizer.is_authorized(identity.email(), tier).await {
        Ok(true) => {}
        Ok(false) => {
            info!(email = %identity.email(), required = %tier, "Access denied");
            return Err(AuthRejection::Forbidden);
        }
        Err(e) => {
            error!(error = %e, email = %identity.email(), "Authorization lookup failed");
            return Err(AuthRejection::BackendUnavailable);
        }
    }

    request.extensions_mut().insert(identity.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(identity);
    Ok(response)
}

/// Rejection type for the tier guards.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    /// No valid identity. Browsers are sent to `login`; API clients get 401.
    NotAuthenticated { login: Option<String> },
    /// The identity lacks the required tier.
    Forbidden,
    /// The authorization backend could not answer.
    BackendUnavailable,
}

impl AuthRejection {
    fn not_authenticated(request: &Request) -> Self {
        if is_api_client(request) {
            return Self::NotAuthenticated { login: None };
        }

        // Nested routers see a stripped URI.
        let uri = request
            .extensions()
            .get::<OriginalUri>()
            .map_or_else(|| request.uri().clone(), |original| original.0.clone());
        let target = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();

        Self::NotAuthenticated {
            login: Some(format!("/login?redirect={}", encoded)),
        }
    }
}

fn is_api_client(request: &Request) -> bool {
    let headers = request.headers();
    headers.contains_key(AUTHORIZATION)
        || headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("application/json"))
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotAuthenticated { login: Some(login) } => {
                return Redirect::to(&login).into_response();
            }
            Self::NotAuthenticated { login: None } => {
                (StatusCode::UNAUTHORIZED, "not authenticated")
            }
            Self::Forbidden => (StatusCode::FORBIDDEN, "insufficient authorization"),
            Self::BackendUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "authorization backend unavailable",
            ),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Returns the identity a guard attached to `response`, if any.
pub fn response_identity(response: &Response) -> Option<&Identity> {
    response.extensions().get::<Identity>()
}
