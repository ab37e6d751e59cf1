//! Smart-account resolution
//!
//! Maps an owner's externally-owned wallet to the smart account that
//! executes calls for it. Two modes:
//!
//! - `Shared`: one relayer-controlled platform account executes for every
//!   user. Custody sits with the relayer; delegation permissions gate
//!   which calls it will sign, not which on-chain account runs them.
//! - `Derived`: each owner gets a deterministic counterfactual account.
//!   The derivation is pure CREATE2 addressing, so the address is known
//!   before the account has ever been deployed.

use alloy::primitives::{keccak256, Address, B256};
use tracing::debug;

/// Deployment-wide account strategy.
#[derive(Debug, Clone)]
pub enum AccountMode {
    /// Single platform smart account for all users
    Shared {
        /// The configured platform account address
        account: Address,
    },
    /// Per-user counterfactual account behind a CREATE2 factory
    Derived {
        /// Factory contract that deploys accounts
        factory: Address,
        /// Hash of the account implementation's init code
        init_code_hash: B256,
    },
}

/// Resolves the executing smart account for an owner wallet.
///
/// Resolution is deterministic and idempotent: the same owner under the
/// same mode always yields the same address, independent of deployment
/// state or call order.
#[derive(Debug, Clone)]
pub struct SmartAccountResolver {
    mode: AccountMode,
}

impl SmartAccountResolver {
    pub fn new(mode: AccountMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &AccountMode {
        &self.mode
    }

    /// Resolve the smart account that executes calls for `owner`.
    pub fn resolve(&self, owner: Address) -> Address {
        match &self.mode {
            AccountMode::Shared { account } => *account,
            AccountMode::Derived {
                factory,
                init_code_hash,
            } => {
                let account = create2_address(*factory, keccak256(owner), *init_code_hash);
                debug!("Derived smart account {:?} for owner {:?}", account, owner);
                account
            }
        }
    }
}

/// CREATE2 address: `keccak256(0xff ‖ deployer ‖ salt ‖ initCodeHash)[12..]`.
fn create2_address(deployer: Address, salt: B256, init_code_hash: B256) -> Address {
    let mut preimage = [0u8; 85];
    preimage[0] = 0xff;
    preimage[1..21].copy_from_slice(deployer.as_slice());
    preimage[21..53].copy_from_slice(salt.as_slice());
    preimage[53..85].copy_from_slice(init_code_hash.as_slice());
    Address::from_slice(&keccak256(preimage)[12..])
}
