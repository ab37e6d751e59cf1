//! Relayable action registry
//!
//! Every executable action is declared here against the permission
//! registry: its parameter shape and the call batch it compiles to. The
//! match on [`Permission`] is exhaustive, so adding a permission without
//! wiring its handler is a compile error - the create-delegation default
//! list and the execute-time dispatch can never drift apart.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::Deserialize;
use std::str::FromStr;

use delegation::Permission;
use relay::BatchCall;

use crate::error::ApiError;

// Platform contract surfaces, encode-only.
sol! {
    interface IPassportNft {
        function mintTo(address to, string uri) external;
        function setTokenURI(uint256 tokenId, string uri) external;
        function burn(uint256 tokenId) external;
        function safeTransferFrom(address from, address to, uint256 tokenId) external;
    }

    interface ITourToken {
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface ITourVault {
        function sendTours(address to, uint256 amount) external;
    }
}

/// Addresses of the platform contracts actions compile against.
#[derive(Debug, Clone)]
pub struct ContractsConfig {
    pub passport_nft: Address,
    pub tour_token: Address,
    pub tour_vault: Address,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MintPassportParams {
    token_uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SendToursParams {
    to: String,
    /// Token amount in base units, decimal string
    amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateProfileParams {
    token_id: u64,
    profile_uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BurnPassportParams {
    token_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TransferPassportParams {
    token_id: u64,
    to: String,
}

/// Compiles action requests into call batches.
pub struct ActionRegistry {
    contracts: ContractsConfig,
}

impl ActionRegistry {
    pub fn new(contracts: ContractsConfig) -> Self {
        Self { contracts }
    }

    /// Resolve an action name against the permission registry.
    pub fn resolve(&self, action: &str) -> Result<Permission, ApiError> {
        action
            .parse::<Permission>()
            .map_err(|_| ApiError::Validation(format!("Unknown action '{}'", action)))
    }

    /// Build the ordered call batch for an action. The batch executes
    /// atomically on-chain through the owner's smart account.
    pub fn build_calls(
        &self,
        action: Permission,
        owner: Address,
        smart_account: Address,
        params: &serde_json::Value,
    ) -> Result<Vec<BatchCall>, ApiError> {
        match action {
            Permission::MintPassport => {
                let p: MintPassportParams = parse_params(params)?;
                Ok(vec![call(
                    self.contracts.passport_nft,
                    IPassportNft::mintToCall {
                        to: owner,
                        uri: p.token_uri,
                    }
                    .abi_encode(),
                )])
            }
            Permission::SendTours => {
                let p: SendToursParams = parse_params(params)?;
                let to = parse_address(&p.to)?;
                let amount = parse_amount(&p.amount)?;
                // Approve-then-spend must land atomically: the vault pulls
                // the approved tokens inside the same operation.
                Ok(vec![
                    call(
                        self.contracts.tour_token,
                        ITourToken::approveCall {
                            spender: self.contracts.tour_vault,
                            amount,
                        }
                        .abi_encode(),
                    ),
                    call(
                        self.contracts.tour_vault,
                        ITourVault::sendToursCall { to, amount }.abi_encode(),
                    ),
                ])
            }
            Permission::UpdateProfile => {
                let p: UpdateProfileParams = parse_params(params)?;
                Ok(vec![call(
                    self.contracts.passport_nft,
                    IPassportNft::setTokenURICall {
                        tokenId: U256::from(p.token_id),
                        uri: p.profile_uri,
                    }
                    .abi_encode(),
                )])
            }
            Permission::BurnPassport => {
                let p: BurnPassportParams = parse_params(params)?;
                Ok(vec![call(
                    self.contracts.passport_nft,
                    IPassportNft::burnCall {
                        tokenId: U256::from(p.token_id),
                    }
                    .abi_encode(),
                )])
            }
            Permission::TransferPassport => {
                let p: TransferPassportParams = parse_params(params)?;
                let to = parse_address(&p.to)?;
                Ok(vec![call(
                    self.contracts.passport_nft,
                    IPassportNft::safeTransferFromCall {
                        from: smart_account,
                        to,
                        tokenId: U256::from(p.token_id),
                    }
                    .abi_encode(),
                )])
            }
        }
    }
}

fn call(to: Address, data: Vec<u8>) -> BatchCall {
    BatchCall {
        to,
        value: U256::ZERO,
        data: Bytes::from(data),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: &serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(params.clone())
        .map_err(|e| ApiError::Validation(format!("Invalid action params: {}", e)))
}

fn parse_address(value: &str) -> Result<Address, ApiError> {
    Address::from_str(value)
        .map_err(|_| ApiError::Validation(format!("Invalid address '{}'", value)))
}

fn parse_amount(value: &str) -> Result<U256, ApiError> {
    U256::from_str(value).map_err(|_| ApiError::Validation(format!("Invalid amount '{}'", value)))
}
