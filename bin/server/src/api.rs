//! Pages and API routes served behind the login flow.
//!
//! `/api/serverinfo` is always public. Every other `/api/*` path is
//! forwarded to the configured upstream once the caller passes the
//! method-based tier guard.

use axum::{
    Json, Router,
    body::Body,
    extract::{OriginalUri, Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{
            AUTHORIZATION, CONNECTION, CONTENT_LENGTH, COOKIE, HOST, PROXY_AUTHENTICATE,
            PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
        },
    },
    middleware::from_fn_with_state,
    response::{Html, IntoResponse, Response},
    routing::{any, get},
};
use serde::Serialize;
use tollgate_core::{HttpPolicy, Identity, Tier};
use tracing::error;
use url::Url;

use crate::auth::{AppState, CurrentIdentity, TierGuard, require_method_tier, require_tier};

/// Largest request body forwarded upstream.
const MAX_PROXY_BODY: usize = 16 * 1024 * 1024;

/// Header carrying the authenticated email to the upstream.
pub const USER_HEADER: &str = "x-tollgate-user";

const USER_HEADER_NAME: HeaderName = HeaderName::from_static(USER_HEADER);
const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Connection-scoped headers, never forwarded in either direction.
const HOP_BY_HOP: [HeaderName; 8] = [
    CONNECTION,
    KEEP_ALIVE,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Builds the `/api` router.
pub fn router(state: &AppState) -> Router<AppState> {
    let api = Router::new()
        .route("/serverinfo", get(server_info))
        .route_layer(from_fn_with_state(
            TierGuard::new(state.clone(), Tier::NoAuth),
            require_tier,
        ));
    if state.upstream.is_none() {
        return api;
    }

    let proxied = Router::new()
        .route("/{*path}", any(proxy))
        .route_layer(from_fn_with_state(state.clone(), require_method_tier));
    api.merge(proxied)
}

/// Response body for `/api/serverinfo`.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    #[serde(rename = "IsPublic")]
    is_public: bool,
}

/// Reports whether read-only routes are open to anonymous callers.
pub async fn server_info(State(state): State<AppState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        is_public: state.settings.public_read,
    })
}

/// Landing page with login and token controls.
pub async fn landing(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Html<String> {
    let hostname = escape(&state.settings.hostname);
    let body = match identity {
        Some(identity) => format!(
            r#"<p>Signed in as {email}.</p>
<p><a href="/token" download="token.json">Download API Token</a></p>
<p><b>Example query:</b><br><code>curl -H "Authorization: Bearer YOURTOKEN" https://{hostname}/api/serverinfo</code></p>
<form method="post" action="/logout"><button type="submit">Log out</button></form>"#,
            email = escape(identity.email())
        ),
        None => r#"<p><a href="/login">Log in</a></p>"#.to_string(),
    };

    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{hostname}</title></head>\n<body>\n<h1>{hostname}</h1>\n{body}\n</body>\n</html>\n"
    ))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Forwarding target for `/api/*`.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base: Url,
}

impl Upstream {
    /// Creates an upstream for `base`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if `base` is not a URL or the
    /// HTTP client cannot be built.
    pub fn new(base: &str, policy: HttpPolicy) -> Result<Self, String> {
        let base = Url::parse(base).map_err(|e| format!("invalid upstream URL: {}", e))?;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(policy.timeout())
            .build()
            .map_err(|e| format!("failed to create HTTP client: {}", e))?;
        Ok(Self { client, base })
    }

    fn target(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path_and_query)
    }
}

/// Proxy errors.
#[derive(Debug)]
pub enum ProxyError {
    /// No upstream API is configured.
    NotConfigured,
    /// The request body exceeds the forwarding limit.
    BodyTooLarge,
    /// The upstream could not be reached or its response not read.
    Upstream(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            Self::NotConfigured => StatusCode::NOT_FOUND.into_response(),
            Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE.into_response(),
            Self::Upstream(msg) => {
                error!("Upstream request failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "Upstream unavailable").into_response()
            }
        }
    }
}

// Gateway credentials and the caller's claimed user stay at the gateway.
fn forwardable(name: &HeaderName) -> bool {
    !HOP_BY_HOP.contains(name)
        && ![HOST, CONTENT_LENGTH, AUTHORIZATION, COOKIE, USER_HEADER_NAME].contains(name)
}

/// Forwards the request to the upstream API.
pub async fn proxy(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Result<Response, ProxyError> {
    let upstream = state.upstream.as_ref().ok_or(ProxyError::NotConfigured)?;
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());

    let (parts, body) = request.into_parts();
    let mut headers: HeaderMap = parts
        .headers
        .iter()
        .filter(|(name, _)| forwardable(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    if let Some(identity) = parts.extensions.get::<Identity>() {
        if let Ok(value) = HeaderValue::from_str(identity.email()) {
            headers.insert(USER_HEADER_NAME, value);
        }
    }

    let body = axum::body::to_bytes(body, MAX_PROXY_BODY)
        .await
        .map_err(|_| ProxyError::BodyTooLarge)?;

    let response = upstream
        .client
        .request(parts.method, upstream.target(&path_and_query))
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    let status = response.status();
    let headers: HeaderMap = response
        .headers()
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(*name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    let mut proxied = Response::new(Body::from(bytes));
    *proxied.status_mut() = status;
    *proxied.headers_mut() = headers;
    Ok(proxied)
}
