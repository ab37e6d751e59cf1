//! HTTP error mapping and sanitization
//!
//! Status-code contract: 400 malformed input, 403 authentication or
//! authorization failure, 404 missing resource, 429 rate-limited, 5xx
//! upstream relay failure. Authentication failures are logged with their
//! specific cause but collapsed to one generic client message - exposing
//! which check failed would give an attacker an oracle against the nonce
//! store. Authorization reasons are not security-sensitive and pass
//! through. Every outbound message runs through [`sanitize_message`].

use std::time::Duration;

use auth::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay::RelayError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors a request handler can surface to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input, rejected before any state mutation
    #[error("{0}")]
    Validation(String),

    /// Signature authentication failed; cause stays internal
    #[error("Authentication failed")]
    Authentication(#[source] AuthError),

    /// Caller lacks a grant, a permission, or budget
    #[error("{0}")]
    Authorization(String),

    /// Resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Too many requests in the current window
    #[error("Rate limit exceeded")]
    RateLimited {
        /// Time until the window resets
        reset_in: Duration,
    },

    /// Relay submission or execution failed upstream
    #[error(transparent)]
    Relay(RelayError),

    /// Anything else; details stay internal
    #[error("Internal service error")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) | Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Relay(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Authentication(cause) => {
                // Specific cause for operators, generic message for clients.
                warn!("Authentication failed: {}", cause);
                json!({ "error": "Authentication failed" })
            }
            Self::RateLimited { reset_in } => json!({
                "error": "Rate limit exceeded",
                "resetInSeconds": reset_in.as_secs().max(1),
            }),
            Self::Relay(cause) => {
                error!("Relay failure: {}", cause);
                json!({ "error": sanitize_message(&cause.to_string()) })
            }
            Self::Internal(cause) => {
                error!("Internal error: {}", cause);
                json!({ "error": "Internal service error" })
            }
            other => json!({ "error": sanitize_message(&other.to_string()) }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_client_fault() {
            Self::Authentication(err)
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Maximum length of any client-facing error message.
const MAX_MESSAGE_LENGTH: usize = 200;

/// Strip internals from a message before it leaves the service:
/// filesystem paths, anything that looks like key material, and
/// excessive length.
pub fn sanitize_message(message: &str) -> String {
    let cleaned: String = message
        .split_whitespace()
        .filter(|token| !token.starts_with('/') && !token.contains("://"))
        .map(redact_hex_blob)
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.chars().count() > MAX_MESSAGE_LENGTH {
        let truncated: String = cleaned.chars().take(MAX_MESSAGE_LENGTH).collect();
        format!("{}...", truncated)
    } else {
        cleaned
    }
}

/// Long hex runs are transaction payloads or key material; 64-hex-char
/// transaction hashes stay readable, anything longer is redacted.
fn redact_hex_blob(token: &str) -> String {
    let hex_part = token.strip_prefix("0x").unwrap_or(token);
    if hex_part.len() > 66 && hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        "[redacted]".to_string()
    } else {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths_and_urls() {
        let message = "read failed at /etc/atlas/relayer.key via https://rpc.internal:8545 please retry";
        let sanitized = sanitize_message(message);
        assert!(!sanitized.contains("/etc"));
        assert!(!sanitized.contains("rpc.internal"));
        assert!(sanitized.contains("read failed"));
    }

    #[test]
    fn test_sanitize_redacts_long_hex() {
        let blob = format!("0x{}", "ab".repeat(80));
        let message = format!("submission rejected for payload {}", blob);
        let sanitized = sanitize_message(&message);
        assert!(!sanitized.contains(&blob));
        assert!(sanitized.contains("[redacted]"));
    }

    #[test]
    fn test_sanitize_keeps_tx_hashes() {
        let hash = format!("0x{}", "4".repeat(64));
        let sanitized = sanitize_message(&format!("operation reverted: {}", hash));
        assert!(sanitized.contains(&hash));
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "word ".repeat(100);
        assert!(sanitize_message(&long).len() <= MAX_MESSAGE_LENGTH + 3);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Authentication(AuthError::NonceMissing).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Authorization("no grant".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::RateLimited {
                reset_in: Duration::from_secs(30)
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::NotFound("no delegation".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_store_errors_stay_internal() {
        let err: ApiError = store::StoreError::Backend("table 'atlas-prod' throttled".into()).into();
        assert!(matches!(err, ApiError::Internal(_)));
        // The client body never carries backend details.
        assert_eq!(err.to_string(), "Internal service error");
    }
}
