//! Provider credential refresh.
//!
//! Stations that need a token hold an `Arc` to their provider's
//! [`CredentialRefreshCoordinator`] and ask it for a refresh after a failed
//! connection. The coordinator decides whether the provider is actually
//! contacted.

mod coordinator;
mod error;
mod tracker;

pub use coordinator::{
    CoordinatorConfig, CredentialRefreshCoordinator, CredentialRefresher, RefreshOutcome,
};
pub use error::CredentialError;
pub use tracker::{FailureInfo, RefreshFailureTracker};
