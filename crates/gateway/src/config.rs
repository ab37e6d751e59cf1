//! Environment configuration
//!
//! Everything the binary needs is read from environment variables at
//! startup, with defaults suitable for local development. Required
//! settings (contract addresses, and the relayer key outside memory-store
//! mode) fail fast with a descriptive error.

use std::str::FromStr;

use alloy::primitives::{keccak256, Address, B256};
use anyhow::{anyhow, Context, Result};

use relay::{AccountMode, RelayConfig};

use crate::actions::ContractsConfig;

/// Which key-value backend holds durable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// DynamoDB, the production backend
    Dynamo,
    /// In-process memory, for local development only
    Memory,
}

/// Full gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address for the HTTP server
    pub bind_addr: String,
    /// Store backend selection
    pub store_backend: StoreBackend,
    /// DynamoDB table name (dynamo backend)
    pub table_name: String,
    /// Identity stamped on grants as the authorized executor
    pub executor_identity: String,
    /// Relay configuration (network, gas, polling)
    pub relay: RelayConfig,
    /// Platform contract addresses
    pub contracts: ContractsConfig,
}

impl GatewayConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let store_backend = match env_string("STORE_BACKEND", "dynamo").as_str() {
            "dynamo" => StoreBackend::Dynamo,
            "memory" => StoreBackend::Memory,
            other => return Err(anyhow!("STORE_BACKEND must be 'dynamo' or 'memory', got '{}'", other)),
        };

        let account_mode = match env_string("ACCOUNT_MODE", "shared").as_str() {
            "shared" => AccountMode::Shared {
                account: required_address("PLATFORM_ACCOUNT")?,
            },
            "derived" => AccountMode::Derived {
                factory: required_address("ACCOUNT_FACTORY")?,
                init_code_hash: required_hash("ACCOUNT_INIT_CODE_HASH")?,
            },
            other => return Err(anyhow!("ACCOUNT_MODE must be 'shared' or 'derived', got '{}'", other)),
        };

        let relay_defaults = RelayConfig::default();
        let relay = RelayConfig {
            rpc_url: env_string("RPC_URL", &relay_defaults.rpc_url),
            chain_id: env_u64("CHAIN_ID", relay_defaults.chain_id),
            relayer_private_key: std::env::var("RELAYER_PRIVATE_KEY").ok(),
            account_mode,
            gas_limit_multiplier: env_f64(
                "GAS_LIMIT_MULTIPLIER",
                relay_defaults.gas_limit_multiplier,
            ),
            fallback_gas_base: env_u64("FALLBACK_GAS_BASE", relay_defaults.fallback_gas_base),
            fallback_gas_per_call: env_u64(
                "FALLBACK_GAS_PER_CALL",
                relay_defaults.fallback_gas_per_call,
            ),
            receipt_poll_interval_secs: env_u64(
                "RECEIPT_POLL_INTERVAL_SECS",
                relay_defaults.receipt_poll_interval_secs,
            ),
            receipt_timeout_secs: env_u64(
                "RECEIPT_TIMEOUT_SECS",
                relay_defaults.receipt_timeout_secs,
            ),
        };
        relay
            .validate()
            .map_err(|e| anyhow!("Invalid relay configuration: {}", e))?;

        Ok(Self {
            bind_addr: env_string("BIND_ADDR", "0.0.0.0:8080"),
            store_backend,
            table_name: env_string("DYNAMODB_TABLE", "atlas-relay"),
            executor_identity: env_string("EXECUTOR_IDENTITY", "atlas-relayer"),
            relay,
            contracts: ContractsConfig {
                passport_nft: required_address("PASSPORT_NFT_ADDRESS")?,
                tour_token: required_address("TOUR_TOKEN_ADDRESS")?,
                tour_vault: required_address("TOUR_VAULT_ADDRESS")?,
            },
        })
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn required_address(key: &str) -> Result<Address> {
    let value = std::env::var(key).with_context(|| format!("{} is required", key))?;
    Address::from_str(&value).map_err(|e| anyhow!("{} is not a valid address: {}", key, e))
}

fn required_hash(key: &str) -> Result<B256> {
    let value = std::env::var(key).with_context(|| format!("{} is required", key))?;
    // Accept either a 32-byte hex value or arbitrary init code to hash.
    if let Ok(hash) = B256::from_str(&value) {
        return Ok(hash);
    }
    let stripped = value.strip_prefix("0x").unwrap_or(&value);
    let bytes =
        hex::decode(stripped).map_err(|e| anyhow!("{} is not valid hex: {}", key, e))?;
    Ok(keccak256(bytes))
}
