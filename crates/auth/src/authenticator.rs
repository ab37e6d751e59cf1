//! Signature verification
//!
//! Verifies that a request was signed by the wallet it claims, over the
//! exact canonical message for its purpose, recently, and with a nonce
//! that has never been used before.

use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, Signature};
use tracing::debug;

use crate::error::{AuthError, Result};
use crate::message::Purpose;
use crate::nonce::NonceStore;

/// Signatures older than this are rejected regardless of validity.
pub const SIGNATURE_MAX_AGE: Duration = Duration::from_secs(300);

/// Allowance for client clocks running ahead of the server.
pub const CLOCK_SKEW_ALLOWANCE: Duration = Duration::from_secs(30);

/// The signed fields a client submits alongside a request body.
#[derive(Debug, Clone)]
pub struct SignedClaim {
    /// Wallet address the caller claims to control
    pub address: String,
    /// Hex-encoded 65-byte EIP-191 signature
    pub signature: String,
    /// Unix timestamp the client signed at (echoed from nonce issuance)
    pub timestamp: i64,
    /// The challenge value echoed from nonce issuance
    pub nonce: String,
}

/// Verifies signed claims against canonical messages.
pub struct SignatureAuthenticator {
    nonces: NonceStore,
    max_age: Duration,
    skew: Duration,
}

impl SignatureAuthenticator {
    pub fn new(nonces: NonceStore) -> Self {
        Self {
            nonces,
            max_age: SIGNATURE_MAX_AGE,
            skew: CLOCK_SKEW_ALLOWANCE,
        }
    }

    /// Verify a signed claim.
    ///
    /// Checks run in fixed order: timestamp freshness, signature
    /// recovery, then nonce consumption. The nonce is only touched once
    /// the signature itself has proven out, so a forged request cannot
    /// burn a victim's live challenge.
    ///
    /// On success the nonce for (address, purpose) is destroyed and the
    /// normalized signer address is returned; the same claim can never
    /// authenticate again.
    pub async fn authenticate(
        &self,
        claim: &SignedClaim,
        purpose: Purpose,
        expected_message: &str,
        require_nonce: bool,
    ) -> Result<Address> {
        let claimed = Address::from_str(&claim.address)
            .map_err(|_| AuthError::MalformedAddress(claim.address.clone()))?;

        let now = chrono::Utc::now().timestamp();
        let age = now - claim.timestamp;
        if age > self.max_age.as_secs() as i64 {
            return Err(AuthError::StaleTimestamp {
                age_secs: age,
                max_secs: self.max_age.as_secs(),
            });
        }
        if age < -(self.skew.as_secs() as i64) {
            return Err(AuthError::FutureTimestamp { ahead_secs: -age });
        }

        let signature = parse_signature(&claim.signature)?;
        let recovered = signature
            .recover_address_from_msg(expected_message.as_bytes())
            .map_err(|e| AuthError::MalformedSignature(e.to_string()))?;

        if recovered != claimed {
            return Err(AuthError::SignerMismatch {
                claimed: format!("{:?}", claimed),
                recovered: format!("{:?}", recovered),
            });
        }

        if require_nonce {
            let stored = self
                .nonces
                .consume(&claim.address, purpose)
                .await?
                .ok_or(AuthError::NonceMissing)?;
            if stored.nonce != claim.nonce {
                return Err(AuthError::NonceMismatch);
            }
        }

        debug!(
            "Authenticated {} for {} (nonce {})",
            claim.address.to_lowercase(),
            purpose,
            if require_nonce { "consumed" } else { "not required" }
        );
        Ok(recovered)
    }
}

fn parse_signature(raw: &str) -> Result<Signature> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(stripped).map_err(|e| AuthError::MalformedSignature(e.to_string()))?;
    Signature::try_from(bytes.as_slice())
        .map_err(|e| AuthError::MalformedSignature(e.to_string()))
}
