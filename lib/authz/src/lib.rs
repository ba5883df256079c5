//! Tier authorization backends for the tollgate gateway.
//!
//! An [`Authorizer`] answers one question: does this email hold at least the
//! required tier? Exactly one backend is chosen at startup, either a local
//! allow-list file or a remote authorization datastore.

mod authorizer;
mod datastore;
mod error;
mod file;

pub use authorizer::Authorizer;
pub use datastore::DatastoreAuthorizer;
pub use error::AuthzError;
pub use file::FileAuthorizer;
