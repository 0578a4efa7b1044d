//! Credential error types.

use stations_parser::StationError;
use thiserror::Error;

/// Errors that can occur while refreshing a provider credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The provider rejected or could not complete the authorization workflow.
    #[error("Authorization failed: {0}")]
    Authorization(#[from] StationError),

    /// Refresh failed for a reason outside the provider client.
    #[error("Refresh failed: {0}")]
    RefreshFailed(String),
}

impl CredentialError {
    /// Check if this error is transient and may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Authorization(e) => e.is_transient(),
            Self::RefreshFailed(_) => true,
        }
    }
}
