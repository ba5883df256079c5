//! The closed set of authorization backends.

use crate::datastore::DatastoreAuthorizer;
use crate::error::AuthzError;
use crate::file::FileAuthorizer;
use tollgate_core::{Result, Tier};
use tracing::instrument;

/// The authorization backend selected for this deployment.
///
/// Chosen once at startup from configuration and never switched at runtime.
#[derive(Debug, Clone)]
pub enum Authorizer {
    /// Allow-list loaded from a local file.
    File(FileAuthorizer),
    /// Remote authorization datastore.
    Datastore(DatastoreAuthorizer),
}

impl Authorizer {
    /// Returns a short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Datastore(_) => "datastore",
        }
    }

    /// Returns true if `email` holds at least `required`.
    ///
    /// `Ok(false)` is a denial. An error means the decision could not be
    /// made and callers must fail closed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::BackendUnavailable`] when a remote backend
    /// cannot answer. The file backend never fails here.
    #[instrument(skip(self), fields(backend = self.kind()))]
    pub async fn is_authorized(
        &self,
        email: &str,
        required: Tier,
    ) -> Result<bool, AuthzError> {
        match self {
            Self::File(file) => Ok(file.is_authorized(email, required)),
            Self::Datastore(datastore) => datastore.is_authorized(email, required).await,
        }
    }
}

impl From<FileAuthorizer> for Authorizer {
    fn from(file: FileAuthorizer) -> Self {
        Self::File(file)
    }
}

impl From<DatastoreAuthorizer> for Authorizer {
    fn from(datastore: DatastoreAuthorizer) -> Self {
        Self::Datastore(datastore)
    }
}
