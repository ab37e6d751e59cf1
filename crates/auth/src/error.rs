//! Error types for signature authentication

use thiserror::Error;

/// Result type alias for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication failures.
///
/// Variants are deliberately specific so logs can distinguish a stale
/// request from a forged signature from a replayed nonce. The HTTP layer
/// collapses all of them into one generic client-facing message; exposing
/// which check failed would hand an attacker an oracle against the nonce
/// store.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Claimed wallet address does not parse
    #[error("Invalid wallet address '{0}'")]
    MalformedAddress(String),

    /// Signature bytes do not parse
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// Request timestamp is older than the freshness window
    #[error("Stale request: signed {age_secs}s ago, window is {max_secs}s")]
    StaleTimestamp {
        /// Seconds since the claimed signing time
        age_secs: i64,
        /// Freshness window in seconds
        max_secs: u64,
    },

    /// Request timestamp lies ahead of server time beyond clock skew
    #[error("Request timestamp is {ahead_secs}s in the future")]
    FutureTimestamp {
        /// Seconds ahead of server time
        ahead_secs: i64,
    },

    /// Recovered signer does not match the claimed address
    #[error("Signature recovers to {recovered}, claimed {claimed}")]
    SignerMismatch {
        /// Address the caller claimed
        claimed: String,
        /// Address the signature actually recovers to
        recovered: String,
    },

    /// No live nonce stored for (address, purpose)
    #[error("No nonce on record for this address and purpose")]
    NonceMissing,

    /// Supplied nonce does not equal the stored challenge
    #[error("Nonce does not match issued challenge")]
    NonceMismatch,

    /// Store failure underneath the nonce or counter operations
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

impl AuthError {
    /// True when the failure was caused by the request rather than by
    /// service infrastructure.
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
