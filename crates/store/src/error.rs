//! Error types for the key-value store layer

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the key-value store layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend request failed (network, throttling, table missing)
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Stored payload could not be decoded
    #[error("Corrupt stored value at '{key}': {reason}")]
    CorruptValue {
        /// Key whose payload failed to decode
        key: String,
        /// Decode failure description
        reason: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if this error is retriable
    ///
    /// Backend errors are usually transient (throttling, connection
    /// resets); corrupt values and serialization failures are not.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retriable() {
        let backend = StoreError::Backend("throttled".to_string());
        assert!(backend.is_retriable());

        let corrupt = StoreError::CorruptValue {
            key: "nonce:0xabc:delegation-create".to_string(),
            reason: "not utf-8".to_string(),
        };
        assert!(!corrupt.is_retriable());
    }

    #[test]
    fn test_error_display() {
        let corrupt = StoreError::CorruptValue {
            key: "delegation:0xabc".to_string(),
            reason: "unexpected EOF".to_string(),
        };
        assert_eq!(
            corrupt.to_string(),
            "Corrupt stored value at 'delegation:0xabc': unexpected EOF"
        );
    }
}
