//! The authenticated identity persisted by the gateway.

use serde::{Deserialize, Serialize};

/// The minimal identity the gateway keeps about a user.
///
/// This is the only subset of the provider's profile that is persisted,
/// and the only input to authorization lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Primary email address reported by the identity provider.
    email: String,
    /// Profile image URL (empty when the provider has none).
    #[serde(rename = "imageURL")]
    image_url: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(email: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            image_url: image_url.into(),
        }
    }

    /// Returns the email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the profile image URL.
    #[must_use]
    pub fn image_url(&self) -> &str {
        &self.image_url
    }
}
