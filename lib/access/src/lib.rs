//! Login-flow state, sessions, and bearer tokens for the tollgate gateway.
//!
//! This crate provides:
//! - Post-login redirect validation (`validate_redirect`)
//! - Per-login flow sessions and the long-lived session payload
//! - Projection of provider profiles down to an `Identity`
//! - Signed bearer token issuance and verification (`TokenIssuer`)
//!
//! # Example
//!
//! ```
//! use chrono::Duration;
//! use tollgate_access::{TokenIssuer, validate_redirect};
//! use tollgate_core::Identity;
//!
//! assert_eq!(validate_redirect("/reports").unwrap(), "/reports");
//! assert!(validate_redirect("https://evil.example/").is_err());
//!
//! let issuer = TokenIssuer::new(b"an-example-secret-that-is-long-enough", Duration::hours(1));
//! let identity = Identity::new("user@example.org", "");
//! let token = issuer.issue(&identity).unwrap();
//! assert_eq!(issuer.verify(token.as_str()).unwrap(), identity);
//! ```

pub mod error;
pub mod profile;
pub mod redirect;
pub mod session;
pub mod token;

// Re-export main types at crate root
pub use error::{RedirectError, TokenError};
pub use profile::ProviderProfile;
pub use redirect::{DEFAULT_REDIRECT, validate_redirect};
pub use session::{FlowSession, ProviderToken, SessionPayload, StateToken};
pub use token::{BearerToken, TokenIssuer, extract_bearer};
