//! Relay configuration

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use std::str::FromStr;

use crate::account::AccountMode;
use crate::error::{RelayError, Result};

/// Configuration for the meta-transaction relay.
///
/// `account_mode` is a deployment-wide switch, never a per-call
/// parameter: mixing shared and derived accounts for the same user
/// within one deployment would scatter funds and permissions across two
/// addresses.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// RPC URL of the target network
    pub rpc_url: String,
    /// Chain ID
    pub chain_id: u64,
    /// Relayer signing key (hex). Treated as a securely held secret;
    /// required for submission.
    pub relayer_private_key: Option<String>,
    /// How owner wallets map to executing smart accounts
    pub account_mode: AccountMode,
    /// Multiplier applied to successful gas estimates for headroom
    pub gas_limit_multiplier: f64,
    /// Static gas floor used when estimation fails
    pub fallback_gas_base: u64,
    /// Static per-call gas added to the floor when estimation fails
    pub fallback_gas_per_call: u64,
    /// Receipt polling interval in seconds
    pub receipt_poll_interval_secs: u64,
    /// Maximum time to wait for a receipt before reporting a timeout
    pub receipt_timeout_secs: u64,
}

impl RelayConfig {
    /// Validate the configuration without touching the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC URL is empty, the private key does not
    /// parse, or the timing knobs are degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(RelayError::Configuration("rpc_url is empty".to_string()));
        }
        if let Some(ref key) = self.relayer_private_key {
            key.parse::<PrivateKeySigner>().map_err(|e| {
                RelayError::Configuration(format!("Invalid relayer private key: {}", e))
            })?;
        }
        if self.gas_limit_multiplier < 1.0 {
            return Err(RelayError::Configuration(format!(
                "gas_limit_multiplier {} would undercut estimates",
                self.gas_limit_multiplier
            )));
        }
        if self.receipt_poll_interval_secs == 0
            || self.receipt_timeout_secs < self.receipt_poll_interval_secs
        {
            return Err(RelayError::Configuration(
                "receipt polling interval must be nonzero and within the timeout".to_string(),
            ));
        }
        Ok(())
    }

    /// The relayer's own address, derived from its key.
    pub fn relayer_address(&self) -> Result<Address> {
        let key = self
            .relayer_private_key
            .as_ref()
            .ok_or(RelayError::NoPrivateKey)?;
        let signer = key
            .parse::<PrivateKeySigner>()
            .map_err(|e| RelayError::Configuration(format!("Invalid relayer private key: {}", e)))?;
        Ok(signer.address())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 31337,
            relayer_private_key: None,
            account_mode: AccountMode::Shared {
                account: Address::ZERO,
            },
            gas_limit_multiplier: 1.2,
            // High enough that an estimation outage costs a little
            // overpricing rather than a failed relay.
            fallback_gas_base: 1_000_000,
            fallback_gas_per_call: 300_000,
            receipt_poll_interval_secs: 2,
            receipt_timeout_secs: 60,
        }
    }
}

/// Parse a 0x-prefixed address, with a configuration-flavored error.
pub fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value)
        .map_err(|e| RelayError::Configuration(format!("Invalid address '{}': {}", value, e)))
}

/// Parse a 32-byte hex value, with a configuration-flavored error.
pub fn parse_hash(value: &str) -> Result<B256> {
    B256::from_str(value)
        .map_err(|e| RelayError::Configuration(format!("Invalid 32-byte hex '{}': {}", value, e)))
}
