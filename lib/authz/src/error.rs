//! Authorization error types.

use std::fmt;

/// Authorization errors.
///
/// A denial is not an error: backends return `Ok(false)`. These variants
/// mean the decision could not be made at all.
#[derive(Debug)]
pub enum AuthzError {
    /// The remote backend could not answer.
    BackendUnavailable {
        /// Error details.
        details: String,
    },
    /// The grant source is malformed.
    InvalidSource {
        /// Where the grants were loaded from.
        source_name: String,
        /// Error details.
        details: String,
    },
    /// The backend was configured with unusable settings.
    Configuration {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for AuthzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendUnavailable { details } => {
                write!(f, "authorization backend unavailable: {}", details)
            }
            Self::InvalidSource {
                source_name,
                details,
            } => {
                write!(
                    f,
                    "invalid authorization source '{}': {}",
                    source_name, details
                )
            }
            Self::Configuration { details } => {
                write!(f, "invalid authorization configuration: {}", details)
            }
        }
    }
}

impl std::error::Error for AuthzError {}
