//! Remote authorization datastore client.
//!
//! Each lookup is `GET {base}/authorization/{email}` with the configured
//! bearer credential. A `200` body of `{"tier": "read"}` is a grant, a `404`
//! means no grant, and anything else means the backend could not answer.

use crate::error::AuthzError;
use reqwest::StatusCode;
use serde::Deserialize;
use tollgate_core::{HttpPolicy, Result, Tier};
use tracing::{debug, instrument, warn};
use url::Url;

/// Response body for a granted lookup.
#[derive(Debug, Deserialize)]
struct GrantResponse {
    tier: Tier,
}

/// Outcome of one lookup attempt.
enum Attempt {
    Done(Tier),
    Retry(String),
    Fail(String),
}

/// Authorization backed by a remote datastore.
///
/// The HTTP client is built once and shared; lookups never mutate it.
#[derive(Clone)]
pub struct DatastoreAuthorizer {
    client: reqwest::Client,
    base_url: Url,
    token: String,
    policy: HttpPolicy,
}

impl DatastoreAuthorizer {
    /// Creates a datastore authorizer.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Configuration`] if the URL is not a valid base
    /// URL or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        token: String,
        policy: HttpPolicy,
    ) -> Result<Self, AuthzError> {
        let base_url = Url::parse(base_url).map_err(|e| AuthzError::Configuration {
            details: format!("invalid datastore URL '{}': {}", base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AuthzError::Configuration {
                details: format!("datastore URL '{}' cannot be a base", base_url),
            }
            .into());
        }

        let client = reqwest::Client::builder()
            .timeout(policy.timeout())
            .build()
            .map_err(|e| AuthzError::Configuration {
                details: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            token,
            policy,
        })
    }

    fn lookup_url(&self, email: &str) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("authorization").push(email);
        }
        url
    }

    /// Looks up the tier granted to `email`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::BackendUnavailable`] if every attempt fails.
    #[instrument(skip(self))]
    pub async fn tier_for(&self, email: &str) -> Result<Tier, AuthzError> {
        let url = self.lookup_url(email);
        let mut last_error = String::new();

        for attempt in 1..=self.policy.attempts() {
            match self.attempt(&url).await {
                Attempt::Done(tier) => {
                    debug!(%tier, attempt, "authorization lookup result");
                    return Ok(tier);
                }
                Attempt::Retry(details) => {
                    warn!(attempt, error = %details, "authorization lookup failed");
                    last_error = details;
                }
                Attempt::Fail(details) => {
                    last_error = details;
                    break;
                }
            }
        }

        Err(AuthzError::BackendUnavailable {
            details: last_error,
        }
        .into())
    }

    async fn attempt(&self, url: &Url) -> Attempt {
        let response = match self
            .client
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(e.to_string()),
        };

        match response.status() {
            StatusCode::OK => match response.json::<GrantResponse>().await {
                Ok(grant) => Attempt::Done(grant.tier),
                Err(e) => Attempt::Fail(format!("undecodable grant: {}", e)),
            },
            StatusCode::NOT_FOUND => Attempt::Done(Tier::NoAuth),
            status if status.is_server_error() => {
                Attempt::Retry(format!("datastore returned {}", status))
            }
            status => Attempt::Fail(format!("datastore returned {}", status)),
        }
    }

    /// Returns true if `email` holds at least `required`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::BackendUnavailable`] if the datastore cannot
    /// answer.
    pub async fn is_authorized(
        &self,
        email: &str,
        required: Tier,
    ) -> Result<bool, AuthzError> {
        if required == Tier::NoAuth {
            return Ok(true);
        }
        Ok(self.tier_for(email).await?.satisfies(required))
    }
}

impl std::fmt::Debug for DatastoreAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreAuthorizer")
            .field("base_url", &self.base_url.as_str())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
