//! Authentication routes for login, callback, logout, profile, and token.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use oauth2::CsrfToken;
use serde::Deserialize;
use tollgate_access::{
    BearerToken, DEFAULT_REDIRECT, FlowSession, RedirectError, SessionPayload, StateToken,
    validate_redirect,
};
use tracing::{error, info, warn};

use super::{AppState, CurrentIdentity, session};

/// Query parameters for `/login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    auto: Option<String>,
    #[serde(default)]
    redirect: Option<String>,
}

impl LoginQuery {
    fn auto(&self) -> bool {
        matches!(self.auto.as_deref(), Some("true" | "1"))
    }
}

/// Query parameters for the OAuth2 callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    state: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    error: Option<String>,
}

/// Starts a login by redirecting to the identity provider.
///
/// With `auto=true` and a valid session the provider round trip is skipped:
/// the session cookie is refreshed and the browser goes straight to the
/// profile page, whatever `redirect` asked for.
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    jar: PrivateCookieJar,
) -> Result<Response, FlowError> {
    if query.auto() {
        if let Some(payload) = session::current_session(&jar) {
            let jar = session::store_session(jar, &payload, &state.settings)
                .map_err(|e| FlowError::SessionPersistence(e.to_string()))?;
            return Ok((jar, Redirect::to(DEFAULT_REDIRECT)).into_response());
        }
    }

    let redirect = validate_redirect(query.redirect.as_deref().unwrap_or_default())?;

    let state_token = StateToken::new(CsrfToken::new_random().secret().clone());
    let flow = FlowSession::new(state_token.clone(), redirect, state.settings.flow_max_age);
    state.flows.insert(flow).await.map_err(|e| {
        error!(error = %e, "Failed to persist flow session");
        FlowError::FlowStore
    })?;

    let jar = session::store_flow(jar, &state_token, &state.settings);
    let auth_url = state.provider.authorization_url(&state_token);

    Ok((jar, Redirect::to(&auth_url)).into_response())
}

/// Completes a login after the provider redirects back.
///
/// The flow is consumed before the code is exchanged, so each state token
/// authorizes at most one exchange attempt. Once consumed, the flow cookie
/// is removed on success and failure alike.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: PrivateCookieJar,
) -> Result<Response, FlowError> {
    let state_token = StateToken::new(query.state);
    if state_token.as_str().is_empty() || !session::has_flow(&jar, &state_token) {
        return Err(FlowError::InvalidState);
    }

    let flow = state
        .flows
        .take(&state_token)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load flow session");
            FlowError::FlowStore
        })?
        .ok_or(FlowError::InvalidState)?;
    if flow.redirect().is_empty() {
        return Err(FlowError::InvalidState);
    }
    let jar = session::clear_flow(jar, &state_token, &state.settings);

    let signed_in = sign_in(&state, query.error, &query.code).await.and_then(|payload| {
        let stored = session::store_session(jar.clone(), &payload, &state.settings)
            .map_err(|e| FlowError::SessionPersistence(e.to_string()))?;
        info!(email = %payload.identity().email(), "Login completed");
        Ok(stored)
    });

    match signed_in {
        Ok(jar) => Ok((jar, Redirect::to(flow.redirect())).into_response()),
        Err(e) => Ok((jar, e).into_response()),
    }
}

async fn sign_in(
    state: &AppState,
    error: Option<String>,
    code: &str,
) -> Result<SessionPayload, FlowError> {
    if let Some(error) = error {
        return Err(FlowError::ProviderDenied(error));
    }
    if code.is_empty() {
        return Err(FlowError::MissingCode);
    }

    let provider_token = state
        .provider
        .exchange_code(code)
        .await
        .map_err(|e| FlowError::ProviderExchange(e.to_string()))?;

    let profile = state
        .provider
        .fetch_profile(&provider_token)
        .await
        .map_err(|e| FlowError::ProviderProfile(e.to_string()))?;

    Ok(SessionPayload::new(profile.project(), provider_token))
}

/// Ends the default session. Always succeeds with an empty body.
pub async fn logout(State(state): State<AppState>, jar: PrivateCookieJar) -> impl IntoResponse {
    (StatusCode::OK, session::clear_session(jar, &state.settings))
}

/// Returns the caller's identity, or `null` when anonymous.
pub async fn profile(CurrentIdentity(identity): CurrentIdentity) -> impl IntoResponse {
    Json(identity)
}

/// Mints a bearer token for the caller.
pub async fn token(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<BearerToken>, Response> {
    let identity = identity.ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "not authenticated" })),
        )
            .into_response()
    })?;

    state.tokens.issue(&identity).map(Json).map_err(|e| {
        error!(error = %e, "Failed to sign token");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    })
}

/// Login flow errors.
#[derive(Debug)]
pub enum FlowError {
    /// The requested post-login redirect is not same-origin.
    InvalidRedirect(RedirectError),
    /// The state token is missing, unknown, expired, or not bound to this browser.
    InvalidState,
    /// The provider redirected back without an authorization code.
    MissingCode,
    /// The provider reported an error instead of a code.
    ProviderDenied(String),
    /// The authorization code could not be exchanged.
    ProviderExchange(String),
    /// The userinfo endpoint failed.
    ProviderProfile(String),
    /// The session cookie could not be written.
    SessionPersistence(String),
    /// The flow store could not be reached.
    FlowStore,
}

impl From<RedirectError> for FlowError {
    fn from(e: RedirectError) -> Self {
        Self::InvalidRedirect(e)
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidRedirect(e) => {
                warn!(error = %e, "Rejected login redirect");
                (StatusCode::BAD_REQUEST, "Invalid redirect")
            }
            Self::InvalidState => (StatusCode::BAD_REQUEST, "Invalid or expired login state"),
            Self::MissingCode => (StatusCode::BAD_REQUEST, "Missing authorization code"),
            Self::ProviderDenied(error) => {
                info!(error = %error, "Provider declined login");
                (StatusCode::FORBIDDEN, "Login was declined")
            }
            Self::ProviderExchange(msg) => {
                error!("Token exchange failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "Authentication failed")
            }
            Self::ProviderProfile(msg) => {
                error!("Profile fetch failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "Could not retrieve profile")
            }
            Self::SessionPersistence(msg) => {
                error!("Session persistence failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::FlowStore => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{
        CookieStore, GOOD_CODE, USER_EMAIL, body_json, body_text, bearer_for, file_authorizer,
        send, test_state_with,
    };
    use crate::router;
    use axum::http::header::LOCATION;
    use tollgate_core::Tier;

    fn location(response: &Response) -> String {
        response.headers()[LOCATION]
            .to_str()
            .expect("location")
            .to_string()
    }

    fn state_param(auth_url: &str) -> String {
        url::Url::parse(auth_url)
            .expect("auth url")
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("state param")
    }

    /// Runs `/login` then `/oauth2callback` and returns the browser's cookies.
    async fn log_in(app: &axum::Router, redirect: &str) -> (CookieStore, Response) {
        let mut browser = CookieStore::default();
        let response = send(app, browser.get(&format!("/login?redirect={}", redirect))).await;
        assert!(response.status().is_redirection());
        browser.absorb(&response);
        let state = state_param(&location(&response));

        let response = send(
            app,
            browser.get(&format!("/oauth2callback?state={}&code={}", state, GOOD_CODE)),
        )
        .await;
        browser.absorb(&response);
        (browser, response)
    }

    #[test]
    fn login_query_auto_flag() {
        let query = LoginQuery {
            auto: Some("true".to_string()),
            redirect: None,
        };
        assert!(query.auto());
        assert!(!LoginQuery::default().auto());
    }

    #[tokio::test]
    async fn full_login_flow() {
        let (state, flows) = test_state_with(file_authorizer(&[(USER_EMAIL, Tier::Read)]));
        let app = router(state.clone());

        let (browser, response) = log_in(&app, "/reports").await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/reports");
        assert!(browser.contains(session::SESSION_COOKIE));
        assert_eq!(browser.names(), vec![session::SESSION_COOKIE]);
        assert!(flows.is_empty().await);

        let response = send(&app, browser.get("/profile")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["email"], USER_EMAIL);
        assert_eq!(body["imageURL"], "https://img.example.org/bob.png");

        let response = send(&app, browser.get("/token")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let token = body["token"].as_str().expect("token");
        let identity = state.tokens.verify(token).expect("verify");
        assert_eq!(identity.email(), USER_EMAIL);
    }

    #[tokio::test]
    async fn login_defaults_redirect_to_profile() {
        let (state, _) = test_state_with(file_authorizer(&[]));
        let app = router(state);

        let mut browser = CookieStore::default();
        let response = send(&app, browser.get("/login")).await;
        browser.absorb(&response);
        let state = state_param(&location(&response));

        let response = send(
            &app,
            browser.get(&format!("/oauth2callback?state={}&code={}", state, GOOD_CODE)),
        )
        .await;
        assert_eq!(location(&response), DEFAULT_REDIRECT);
    }

    #[tokio::test]
    async fn off_origin_redirect_is_rejected_without_flow() {
        let (state, flows) = test_state_with(file_authorizer(&[]));
        let app = router(state);

        let response = send(
            &app,
            CookieStore::default().get("/login?redirect=http%3A%2F%2Fevil.example%2F"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("set-cookie").is_none());
        assert!(flows.is_empty().await);
    }

    #[tokio::test]
    async fn replayed_callback_is_rejected() {
        let (state, _) = test_state_with(file_authorizer(&[]));
        let app = router(state);

        let mut browser = CookieStore::default();
        let response = send(&app, browser.get("/login?redirect=/reports")).await;
        browser.absorb(&response);
        let state = state_param(&location(&response));
        let callback = format!("/oauth2callback?state={}&code={}", state, GOOD_CODE);

        // Keep the flow cookie so the replay is rejected by the store alone.
        let stale = browser.clone();
        let response = send(&app, browser.get(&callback)).await;
        assert!(response.status().is_redirection());

        let response = send(&app, stale.get(&callback)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_without_flow_cookie_is_rejected() {
        let (state, flows) = test_state_with(file_authorizer(&[]));
        let app = router(state);

        let response = send(&app, CookieStore::default().get("/login")).await;
        let state = state_param(&location(&response));

        let response = send(
            &app,
            CookieStore::default()
                .get(&format!("/oauth2callback?state={}&code={}", state, GOOD_CODE)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        // The legitimate browser can still finish.
        assert_eq!(flows.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_state_is_rejected() {
        let (state, _) = test_state_with(file_authorizer(&[]));
        let app = router(state);

        let response = send(
            &app,
            CookieStore::default().get("/oauth2callback?state=forged&code=good-code"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failed_exchange_is_bad_gateway_without_session() {
        let (state, flows) = test_state_with(file_authorizer(&[]));
        let app = router(state);

        let mut browser = CookieStore::default();
        let response = send(&app, browser.get("/login")).await;
        browser.absorb(&response);
        let state = state_param(&location(&response));

        let response = send(
            &app,
            browser.get(&format!("/oauth2callback?state={}&code=bad-code", state)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        browser.absorb(&response);
        assert!(!browser.contains(session::SESSION_COOKIE));
        assert!(
            browser
                .names()
                .iter()
                .all(|name| !name.starts_with(session::FLOW_COOKIE_PREFIX))
        );
        // The flow was consumed anyway.
        assert!(flows.is_empty().await);
    }

    #[tokio::test]
    async fn provider_error_param_is_declined() {
        let (state, _) = test_state_with(file_authorizer(&[]));
        let app = router(state);

        let mut browser = CookieStore::default();
        let response = send(&app, browser.get("/login")).await;
        browser.absorb(&response);
        let state = state_param(&location(&response));

        let response = send(
            &app,
            browser.get(&format!("/oauth2callback?state={}&error=access_denied", state)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        browser.absorb(&response);
        assert!(browser.names().is_empty());
    }

    #[tokio::test]
    async fn auto_login_with_session_skips_provider() {
        let (state, flows) = test_state_with(file_authorizer(&[]));
        let app = router(state);
        let (browser, _) = log_in(&app, "/reports").await;

        let response = send(&app, browser.get("/login?auto=true&redirect=/elsewhere")).await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), DEFAULT_REDIRECT);
        let set_cookies: Vec<_> = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(set_cookies.len(), 1);
        assert!(set_cookies[0].starts_with("tollgate="));
        assert!(flows.is_empty().await);
    }

    #[tokio::test]
    async fn auto_login_without_session_goes_to_provider() {
        let (state, _) = test_state_with(file_authorizer(&[]));
        let app = router(state);

        let response = send(&app, CookieStore::default().get("/login?auto=true")).await;
        assert!(location(&response).starts_with("https://provider.test/auth?state="));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (state, _) = test_state_with(file_authorizer(&[]));
        let app = router(state);
        let (mut browser, _) = log_in(&app, "/profile").await;

        let response = send(&app, browser.request("POST", "/logout")).await;
        assert_eq!(response.status(), StatusCode::OK);
        browser.absorb(&response);
        assert!(body_text(response).await.is_empty());
        assert!(!browser.contains(session::SESSION_COOKIE));

        let response = send(&app, browser.request("POST", "/logout")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, browser.get("/profile")).await;
        assert_eq!(body_json(response).await, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn anonymous_profile_is_null_and_token_is_401() {
        let (state, _) = test_state_with(file_authorizer(&[]));
        let app = router(state);

        let response = send(&app, CookieStore::default().get("/profile")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::Value::Null);

        let response = send(&app, CookieStore::default().get("/token")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_token_resolves_profile() {
        let (state, _) = test_state_with(file_authorizer(&[]));
        let auth = bearer_for(&state, "carol@example.org");
        let app = router(state);

        let request = axum::http::Request::builder()
            .uri("/profile")
            .header("authorization", auth)
            .body(axum::body::Body::empty())
            .expect("request");
        let body = body_json(send(&app, request).await).await;
        assert_eq!(body["email"], "carol@example.org");
    }

    #[tokio::test]
    async fn bad_bearer_does_not_fall_back_to_cookie() {
        let (state, _) = test_state_with(file_authorizer(&[]));
        let app = router(state);
        let (browser, _) = log_in(&app, "/profile").await;

        let request = axum::http::Request::builder()
            .uri("/profile")
            .header("cookie", browser.header())
            .header("authorization", "Bearer tampered")
            .body(axum::body::Body::empty())
            .expect("request");
        let body = body_json(send(&app, request).await).await;
        assert_eq!(body, serde_json::Value::Null);
    }
}
