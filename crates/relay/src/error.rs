//! Error types for the relay layer

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur relaying a batched operation
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No relayer key configured for write operations
    #[error("No relayer private key configured - submission requires one")]
    NoPrivateKey,

    /// Provider creation or connection error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Nothing to execute
    #[error("Cannot relay an empty call batch")]
    EmptyBatch,

    /// Gas estimation failed. Never surfaced to callers: the executor
    /// absorbs it and substitutes static limits.
    #[error("Gas estimation failed: {0}")]
    Estimation(String),

    /// Submission failed. Terminal for the request: a blind resubmission
    /// could double-execute a side-effecting call.
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Operation was mined but its own execution reverted. Distinct from
    /// never-mined: the transaction exists on-chain.
    #[error("Operation reverted on-chain: {tx_hash}")]
    Reverted {
        /// Hash of the mined transaction
        tx_hash: String,
    },

    /// No receipt within the polling deadline. Not a failure: the
    /// operation may still land after the caller stops waiting.
    #[error("No receipt for {tx_hash} after {waited_secs}s")]
    ReceiptTimeout {
        /// Hash of the submitted transaction, for independent polling
        tx_hash: String,
        /// How long the executor waited
        waited_secs: u64,
    },

    /// RPC connection or network error
    #[error("RPC error: {0}")]
    Rpc(String),
}

impl RelayError {
    /// True for the receipt-timeout outcome, which callers must not
    /// equate with failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReceiptTimeout { .. })
    }

    /// Check if this error indicates a configuration problem
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::NoPrivateKey)
    }

    /// Hash of the on-chain transaction, when one exists.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            Self::Reverted { tx_hash } | Self::ReceiptTimeout { tx_hash, .. } => Some(tx_hash),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_not_conflated_with_failure() {
        let timeout = RelayError::ReceiptTimeout {
            tx_hash: "0xabc".to_string(),
            waited_secs: 60,
        };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.tx_hash(), Some("0xabc"));

        let reverted = RelayError::Reverted {
            tx_hash: "0xdef".to_string(),
        };
        assert!(!reverted.is_timeout());
        assert_eq!(reverted.tx_hash(), Some("0xdef"));

        let submission = RelayError::Submission("nonce too low".to_string());
        assert!(!submission.is_timeout());
        assert_eq!(submission.tx_hash(), None);
    }
}
