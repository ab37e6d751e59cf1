//! Chain gateway
//!
//! The single seam between the executor and the network. Production uses
//! alloy providers against the configured RPC endpoint; tests substitute
//! a scripted implementation.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use tracing::debug;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

// Minimal smart-account surface: one entry point executing an ordered
// call batch atomically (all succeed or the operation reverts).
sol! {
    #[sol(rpc)]
    interface ISmartAccount {
        function executeBatch(
            address[] calldata targets,
            uint256[] calldata values,
            bytes[] calldata datas
        ) external payable;
    }
}

/// One call in a batched operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCall {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// Terminal state of a submitted operation.
///
/// `success` is the operation's own flag, not "the transaction was
/// mined": account-abstraction execution can mine and still revert
/// internally, and callers must treat those differently.
#[derive(Debug, Clone)]
pub struct OperationReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
}

/// Network operations the executor needs.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Estimate gas for the batch as executed by `account`.
    async fn estimate_batch(&self, account: Address, calls: &[BatchCall]) -> Result<u64>;

    /// Submit the batch through `account` with an explicit gas limit.
    /// Returns the transaction hash without waiting for inclusion.
    async fn submit_batch(
        &self,
        account: Address,
        calls: &[BatchCall],
        gas_limit: u64,
    ) -> Result<TxHash>;

    /// Look up the receipt for a submitted operation. `None` while still
    /// pending.
    async fn fetch_receipt(&self, tx_hash: TxHash) -> Result<Option<OperationReceipt>>;
}

/// Production gateway over alloy HTTP providers.
///
/// Providers are not cached; a fresh one is created per operation.
pub struct AlloyGateway {
    config: RelayConfig,
}

impl AlloyGateway {
    /// Create a gateway, validating the configuration up front.
    pub fn new(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn create_provider(&self) -> Result<impl Provider> {
        let rpc_url = self
            .config
            .rpc_url
            .parse()
            .map_err(|e| RelayError::Provider(format!("Invalid RPC URL: {}", e)))?;
        Ok(ProviderBuilder::new().connect_http(rpc_url))
    }

    fn create_provider_with_signer(&self) -> Result<impl Provider> {
        let private_key = self
            .config
            .relayer_private_key
            .as_ref()
            .ok_or(RelayError::NoPrivateKey)?;
        let signer = private_key
            .parse::<PrivateKeySigner>()
            .map_err(|e| RelayError::Configuration(format!("Invalid relayer private key: {}", e)))?;
        let wallet = EthereumWallet::from(signer);

        let rpc_url = self
            .config
            .rpc_url
            .parse()
            .map_err(|e| RelayError::Provider(format!("Invalid RPC URL: {}", e)))?;
        Ok(ProviderBuilder::new().wallet(wallet).connect_http(rpc_url))
    }

    fn split_batch(calls: &[BatchCall]) -> (Vec<Address>, Vec<U256>, Vec<Bytes>) {
        let targets = calls.iter().map(|c| c.to).collect();
        let values = calls.iter().map(|c| c.value).collect();
        let datas = calls.iter().map(|c| c.data.clone()).collect();
        (targets, values, datas)
    }
}

#[async_trait]
impl ChainGateway for AlloyGateway {
    async fn estimate_batch(&self, account: Address, calls: &[BatchCall]) -> Result<u64> {
        let provider = self.create_provider_with_signer()?;
        let contract = ISmartAccount::new(account, &provider);
        let (targets, values, datas) = Self::split_batch(calls);

        let estimate = contract
            .executeBatch(targets, values, datas)
            .estimate_gas()
            .await
            .map_err(|e| RelayError::Estimation(e.to_string()))?;

        debug!(
            "Estimated {} gas for {}-call batch via {:?}",
            estimate,
            calls.len(),
            account
        );
        Ok(estimate)
    }

    async fn submit_batch(
        &self,
        account: Address,
        calls: &[BatchCall],
        gas_limit: u64,
    ) -> Result<TxHash> {
        let provider = self.create_provider_with_signer()?;
        let contract = ISmartAccount::new(account, &provider);
        let (targets, values, datas) = Self::split_batch(calls);

        let pending = contract
            .executeBatch(targets, values, datas)
            .gas(gas_limit)
            .send()
            .await
            .map_err(|e| RelayError::Submission(e.to_string()))?;

        let tx_hash = *pending.tx_hash();
        debug!(
            "Submitted {}-call batch via {:?}: {:?}",
            calls.len(),
            account,
            tx_hash
        );
        Ok(tx_hash)
    }

    async fn fetch_receipt(&self, tx_hash: TxHash) -> Result<Option<OperationReceipt>> {
        let provider = self.create_provider()?;
        let receipt = provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| RelayError::Rpc(e.to_string()))?;

        Ok(receipt.map(|receipt| OperationReceipt {
            tx_hash,
            block_number: receipt.block_number,
            success: receipt.status(),
        }))
    }
}
