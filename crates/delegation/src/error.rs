//! Error types for the delegation layer

use thiserror::Error;

use crate::grant::{MAX_DURATION_HOURS, MAX_TRANSACTION_BUDGET};

/// Result type alias for delegation operations
pub type Result<T> = std::result::Result<T, DelegationError>;

/// Errors that can occur managing delegation grants
#[derive(Debug, Error)]
pub enum DelegationError {
    /// Requested duration is out of bounds
    #[error("Invalid duration: {hours}h (allowed 1..={MAX_DURATION_HOURS})")]
    InvalidDuration {
        /// Hours requested
        hours: u32,
    },

    /// Requested transaction budget is out of bounds
    #[error("Invalid transaction budget: {requested} (allowed 1..={MAX_TRANSACTION_BUDGET})")]
    InvalidBudget {
        /// Budget requested
        requested: u32,
    },

    /// Permission list is empty after deduplication
    #[error("A delegation needs at least one permission")]
    NoPermissions,

    /// Action name is not in the permission registry
    #[error("Unknown permission '{0}'")]
    UnknownPermission(String),

    /// Operation requires a live grant and none exists
    #[error("No active delegation for {0}")]
    NoActiveGrant(String),

    /// Write acknowledged but read-back did not return the grant
    #[error("Grant persistence could not be verified for {0}")]
    PersistenceVerification(String),

    /// Store failure underneath a grant operation
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

impl DelegationError {
    /// True when the failure was caused by the request rather than by
    /// service infrastructure.
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::PersistenceVerification(_))
    }
}
