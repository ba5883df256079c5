//! Identity provider profiles and their projection to an [`Identity`].
//!
//! The provider returns a much larger, provider-specific payload than the
//! gateway needs. Only the primary email and the picture URL are kept, which
//! keeps the session cookie small and decoupled from the provider's schema.

use serde::Deserialize;
use tollgate_core::Identity;

/// The OpenID Connect userinfo payload returned by the identity provider.
///
/// Unknown fields are ignored. `email` is required: a profile without one
/// cannot be authorized and fails to decode.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    /// Provider-specific subject identifier.
    #[serde(default)]
    pub sub: String,
    /// Primary email address.
    pub email: String,
    /// Whether the provider verified the email.
    #[serde(default)]
    pub email_verified: Option<bool>,
    /// Full display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Given name.
    #[serde(default)]
    pub given_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub family_name: Option<String>,
    /// Profile picture URL.
    #[serde(default)]
    pub picture: Option<String>,
    /// Preferred locale.
    #[serde(default)]
    pub locale: Option<String>,
    /// Hosted domain (Google Workspace accounts).
    #[serde(default)]
    pub hd: Option<String>,
}

impl ProviderProfile {
    /// Strips the profile down to the identity the gateway persists.
    #[must_use]
    pub fn project(&self) -> Identity {
        Identity::new(
            self.email.clone(),
            self.picture.clone().unwrap_or_default(),
        )
    }
}

impl From<&ProviderProfile> for Identity {
    fn from(profile: &ProviderProfile) -> Self {
        profile.project()
    }
}
