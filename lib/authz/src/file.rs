//! File-backed authorization.
//!
//! The file is a JSON object mapping email addresses to tiers:
//!
//! ```json
//! { "alice@example.org": "admin", "bob@example.org": "read" }
//! ```
//!
//! It is read once at startup. Emails are compared case-insensitively and
//! unlisted emails hold no tier.

use crate::error::AuthzError;
use std::collections::HashMap;
use std::path::Path;
use tollgate_core::{Result, Tier};

/// In-memory allow-list loaded from a local file.
#[derive(Debug, Clone, Default)]
pub struct FileAuthorizer {
    grants: HashMap<String, Tier>,
}

impl FileAuthorizer {
    /// Loads grants from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidSource`] if the file cannot be read or
    /// does not map emails to known tiers.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthzError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| AuthzError::InvalidSource {
            source_name: path.display().to_string(),
            details: e.to_string(),
        })?;

        let authorizer = Self::from_json(&path.display().to_string(), &contents)?;
        tracing::info!(
            path = %path.display(),
            grants = authorizer.grants.len(),
            "Loaded authorization file"
        );
        Ok(authorizer)
    }

    /// Parses grants from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidSource`] if the text is not an object of
    /// email → tier.
    pub fn from_json(source_name: &str, json: &str) -> Result<Self, AuthzError> {
        let raw: HashMap<String, Tier> =
            serde_json::from_str(json).map_err(|e| AuthzError::InvalidSource {
                source_name: source_name.to_string(),
                details: e.to_string(),
            })?;

        Ok(Self::from_grants(raw))
    }

    /// Builds an authorizer from explicit grants.
    #[must_use]
    pub fn from_grants(grants: impl IntoIterator<Item = (String, Tier)>) -> Self {
        Self {
            grants: grants
                .into_iter()
                .map(|(email, tier)| (email.to_lowercase(), tier))
                .collect(),
        }
    }

    /// Returns the tier granted to `email`.
    #[must_use]
    pub fn tier_for(&self, email: &str) -> Tier {
        self.grants
            .get(&email.to_lowercase())
            .copied()
            .unwrap_or_default()
    }

    /// Returns true if `email` holds at least `required`.
    #[must_use]
    pub fn is_authorized(&self, email: &str, required: Tier) -> bool {
        self.tier_for(email).satisfies(required)
    }
}
