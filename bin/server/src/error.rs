//! Domain error types for server startup.
//!
//! Request-time failures have their own types next to the handlers that
//! produce them ([`FlowError`](crate::auth::routes::FlowError),
//! [`AuthRejection`](crate::auth::middleware::AuthRejection)). The types here
//! are fatal: the process logs them and exits.

use std::fmt;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Sources could not be read or deserialized.
    Load { details: String },
    /// A required value is empty.
    Missing { field: &'static str },
    /// A value is present but unusable.
    Invalid {
        field: &'static str,
        details: String,
    },
    /// The signing secret is too short.
    WeakSecret { length: usize },
    /// Only one of the certificate and key paths is set.
    IncompleteTls,
    /// Neither an authorization datastore nor file is configured.
    MissingAuthBackend,
    /// Both an authorization datastore and file are configured.
    ConflictingAuthBackends,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { details } => write!(f, "failed to load configuration: {}", details),
            Self::Missing { field } => write!(f, "missing required setting '{}'", field),
            Self::Invalid { field, details } => {
                write!(f, "invalid setting '{}': {}", field, details)
            }
            Self::WeakSecret { length } => write!(
                f,
                "signing_secret must be at least {} bytes, got {}",
                crate::config::MIN_SECRET_LEN,
                length
            ),
            Self::IncompleteTls => write!(f, "cert_path and key_path must be set together"),
            Self::MissingAuthBackend => {
                write!(f, "one of auth_datastore_url or auth_file_path is required")
            }
            Self::ConflictingAuthBackends => {
                write!(f, "auth_datastore_url and auth_file_path are mutually exclusive")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors assembling application state.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration was rejected.
    Config(ConfigError),
    /// The authorization backend could not be built.
    Authorization { details: String },
    /// The identity provider client could not be built.
    Provider { details: String },
    /// The flow store database could not be reached or migrated.
    Database { details: String },
    /// The TLS certificate or key could not be loaded.
    Tls { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::Authorization { details } => {
                write!(f, "authorization backend setup failed: {}", details)
            }
            Self::Provider { details } => write!(f, "identity provider setup failed: {}", details),
            Self::Database { details } => write!(f, "flow store database error: {}", details),
            Self::Tls { details } => write!(f, "TLS setup failed: {}", details),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<ConfigError> for StartupError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
