//! The default session cookie and identity resolution.
//!
//! The session cookie holds a JSON [`SessionPayload`] encrypted with the
//! key derived from the signing secret. Flow cookies are encrypted the same
//! way and bind a state token to the browser that started the login.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use std::convert::Infallible;
use tollgate_access::{SessionPayload, StateToken, extract_bearer};
use tollgate_core::Identity;
use tracing::debug;

use super::{AppState, GatewaySettings};

/// Default session cookie name.
pub const SESSION_COOKIE: &str = "tollgate";

/// Prefix of per-flow cookie names.
pub const FLOW_COOKIE_PREFIX: &str = "flow-";

/// Returns the cookie name for the flow identified by `state`.
#[must_use]
pub fn flow_cookie_name(state: &StateToken) -> String {
    format!("{}{}", FLOW_COOKIE_PREFIX, state.as_str())
}

fn base_cookie(
    name: String,
    value: String,
    settings: &GatewaySettings,
    max_age: time::Duration,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(settings.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// Reads the session payload, if present, decryptable, and still valid.
#[must_use]
pub fn current_session(jar: &PrivateCookieJar) -> Option<SessionPayload> {
    let cookie = jar.get(SESSION_COOKIE)?;
    match serde_json::from_str::<SessionPayload>(cookie.value()) {
        Ok(payload) if payload.is_valid() => Some(payload),
        Ok(_) => {
            debug!("Ignoring session with expired provider token");
            None
        }
        Err(e) => {
            debug!(error = %e, "Ignoring undecodable session cookie");
            None
        }
    }
}

/// Stores `payload` in the session cookie.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialized.
pub fn store_session(
    jar: PrivateCookieJar,
    payload: &SessionPayload,
    settings: &GatewaySettings,
) -> Result<PrivateCookieJar, serde_json::Error> {
    let value = serde_json::to_string(payload)?;
    Ok(jar.add(base_cookie(
        SESSION_COOKIE.to_string(),
        value,
        settings,
        settings.session_max_age,
    )))
}

/// Expires the session cookie. Safe to call without a session.
#[must_use]
pub fn clear_session(jar: PrivateCookieJar, settings: &GatewaySettings) -> PrivateCookieJar {
    jar.add(base_cookie(
        SESSION_COOKIE.to_string(),
        String::new(),
        settings,
        time::Duration::ZERO,
    ))
}

/// Binds `state` to this browser.
#[must_use]
pub fn store_flow(
    jar: PrivateCookieJar,
    state: &StateToken,
    settings: &GatewaySettings,
) -> PrivateCookieJar {
    let max_age = time::Duration::seconds(settings.flow_max_age.num_seconds());
    jar.add(base_cookie(
        flow_cookie_name(state),
        state.as_str().to_string(),
        settings,
        max_age,
    ))
}

/// Returns true if this browser started the flow named by `state`.
#[must_use]
pub fn has_flow(jar: &PrivateCookieJar, state: &StateToken) -> bool {
    jar.get(&flow_cookie_name(state))
        .is_some_and(|cookie| cookie.value() == state.as_str())
}

/// Expires the flow cookie for `state`.
#[must_use]
pub fn clear_flow(
    jar: PrivateCookieJar,
    state: &StateToken,
    settings: &GatewaySettings,
) -> PrivateCookieJar {
    jar.add(base_cookie(
        flow_cookie_name(state),
        String::new(),
        settings,
        time::Duration::ZERO,
    ))
}

/// Resolves the caller's identity from request headers.
///
/// A bearer token takes precedence. When one is presented but fails
/// verification the caller is anonymous; the session cookie is not
/// consulted.
#[must_use]
pub fn resolve_identity(headers: &HeaderMap, state: &AppState) -> Option<Identity> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer);

    if let Some(token) = bearer {
        return match state.tokens.verify(token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                debug!(error = %e, "Rejected bearer token");
                None
            }
        };
    }

    let jar = PrivateCookieJar::from_headers(headers, state.cookie_key().clone());
    current_session(&jar).map(|payload| payload.identity().clone())
}

/// Extractor for the caller's identity, if any.
///
/// Never rejects: anonymous callers extract as `CurrentIdentity(None)`.
pub struct CurrentIdentity(pub Option<Identity>);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        Ok(CurrentIdentity(resolve_identity(&parts.headers, &app_state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{TEST_SECRET, test_settings};
    use axum::http::header::{COOKIE, HeaderValue, SET_COOKIE};
    use axum::response::IntoResponse;
    use axum_extra::extract::cookie::Key;
    use tollgate_access::ProviderToken;

    fn round_trip(jar: PrivateCookieJar, key: &Key) -> PrivateCookieJar {
        let response = jar.into_response();
        let header = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .collect::<Vec<_>>()
            .join("; ");

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&header).expect("header"));
        PrivateCookieJar::from_headers(&headers, key.clone())
    }

    #[test]
    fn flow_cookie_name_uses_state() {
        assert_eq!(flow_cookie_name(&StateToken::from("abc")), "flow-abc");
    }

    #[test]
    fn session_round_trips_through_encrypted_cookie() {
        let key = Key::derive_from(TEST_SECRET);
        let settings = test_settings();
        let payload = SessionPayload::new(
            Identity::new("bob@example.org", ""),
            ProviderToken::new("ya29.access".to_string(), None),
        );

        let jar = store_session(PrivateCookieJar::new(key.clone()), &payload, &settings)
            .expect("store");
        let jar = round_trip(jar, &key);

        assert_eq!(current_session(&jar), Some(payload));
    }

    #[test]
    fn session_with_expired_provider_token_is_ignored() {
        let key = Key::derive_from(TEST_SECRET);
        let payload = SessionPayload::new(
            Identity::new("bob@example.org", ""),
            ProviderToken::new(
                "ya29.access".to_string(),
                Some(chrono::Utc::now() - chrono::Duration::minutes(1)),
            ),
        );

        let jar = store_session(PrivateCookieJar::new(key.clone()), &payload, &test_settings())
            .expect("store");
        assert!(current_session(&round_trip(jar, &key)).is_none());
    }

    #[test]
    fn flow_cookie_binds_state() {
        let key = Key::derive_from(TEST_SECRET);
        let state = StateToken::from("abc");
        let jar = round_trip(
            store_flow(PrivateCookieJar::new(key.clone()), &state, &test_settings()),
            &key,
        );

        assert!(has_flow(&jar, &state));
        assert!(!has_flow(&jar, &StateToken::from("other")));
    }
}
