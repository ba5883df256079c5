//! Post-login redirect validation.
//!
//! Every redirect the login flow stores or follows passes through
//! [`validate_redirect`]. Only same-origin references are accepted.

use crate::error::RedirectError;
use url::Url;

/// Destination used when no redirect is requested, or one is rejected.
pub const DEFAULT_REDIRECT: &str = "/profile";

/// Origin that relative references are resolved against for checking.
const CHECK_BASE: &str = "http://gateway.invalid/";

/// Validates a caller-supplied post-login destination.
///
/// An empty path yields [`DEFAULT_REDIRECT`]. A path that cannot be parsed,
/// that is absolute, or that a browser would resolve to another host
/// (`//host/x`, `/\host`) is rejected. Accepted paths are returned
/// normalized and percent-encoded.
///
/// # Errors
///
/// Returns a [`RedirectError`] carrying [`DEFAULT_REDIRECT`] as its fallback.
pub fn validate_redirect(path: &str) -> Result<String, RedirectError> {
    if path.is_empty() {
        return Ok(DEFAULT_REDIRECT.to_string());
    }

    // Control characters are dropped by URL parsers but poison the Location header.
    if path.chars().any(char::is_control) {
        return Err(RedirectError::Invalid {
            fallback: DEFAULT_REDIRECT.to_string(),
            reason: "contains control characters".to_string(),
        });
    }

    match Url::parse(path) {
        Ok(_) => {
            return Err(RedirectError::OffOrigin {
                fallback: DEFAULT_REDIRECT.to_string(),
            });
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => {}
        Err(e) => {
            return Err(RedirectError::Invalid {
                fallback: DEFAULT_REDIRECT.to_string(),
                reason: e.to_string(),
            });
        }
    }

    let base = Url::parse(CHECK_BASE).map_err(|e| RedirectError::Invalid {
        fallback: DEFAULT_REDIRECT.to_string(),
        reason: e.to_string(),
    })?;
    let resolved = base.join(path).map_err(|e| RedirectError::Invalid {
        fallback: DEFAULT_REDIRECT.to_string(),
        reason: e.to_string(),
    })?;

    if resolved.origin() != base.origin() {
        tracing::debug!(redirect = %path, "rejected scheme-relative redirect");
        return Err(RedirectError::OffOrigin {
            fallback: DEFAULT_REDIRECT.to_string(),
        });
    }

    Ok(same_origin_reference(&resolved))
}

/// Renders the path, query, and fragment of `url` in its percent-encoded form,
/// which is always a valid `Location` value.
fn same_origin_reference(url: &Url) -> String {
    let mut reference = url.path().to_string();
    if let Some(query) = url.query() {
        reference.push('?');
        reference.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        reference.push('#');
        reference.push_str(fragment);
    }
    reference
}
