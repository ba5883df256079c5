//! Router-wide middleware.

use axum::{
    extract::Request,
    http::{
        HeaderValue, StatusCode,
        header::{HOST, LOCATION},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::info;

use crate::auth::middleware::response_identity;

/// Coarse request category for the access log.
fn category(path: &str) -> &'static str {
    match path {
        "/login" | "/oauth2callback" | "/logout" | "/profile" | "/token" => "auth",
        _ if path.starts_with("/api/") => "api",
        _ => "page",
    }
}

/// Logs one line per request with the authorized user, if any.
pub async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    let user = response_identity(&response).map_or("", |identity| identity.email());
    info!(
        target: "tollgate::access",
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        user = user,
        category = category(uri.path()),
        "request"
    );

    response
}

/// Permanently redirects `www.` hosts to the bare host.
///
/// The location is scheme-relative so it works behind TLS termination.
pub async fn redirect_www(request: Request, next: Next) -> Response {
    let bare_host = request
        .headers()
        .get(HOST)
        .and_then(|host| host.to_str().ok())
        .and_then(|host| host.strip_prefix("www."))
        .map(str::to_string);

    let Some(bare_host) = bare_host else {
        return next.run(request).await;
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    match HeaderValue::from_str(&format!("//{}{}", bare_host, path_and_query)) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}
