//! Meta-transaction relay
//!
//! Executes batches of calls through a smart account on the user's
//! behalf, with the relayer paying gas:
//!
//! - [`SmartAccountResolver`] - maps an owner wallet to the smart account
//!   that executes its calls (shared platform account or per-user
//!   deterministic derivation)
//! - [`ChainGateway`] - the network seam: gas estimation, submission,
//!   receipt lookup
//! - [`MetaTransactionExecutor`] - estimate (with static-limit fallback),
//!   submit once, poll for a terminal receipt with a deadline, and check
//!   the operation's own success flag
//!
//! The batch executes atomically on-chain: either every call succeeds or
//! the whole operation reverts.

pub mod account;
pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod poll;

pub use account::{AccountMode, SmartAccountResolver};
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use executor::{MetaTransactionExecutor, RelayedOperation};
pub use gateway::{AlloyGateway, BatchCall, ChainGateway, OperationReceipt};
pub use poll::{poll_until, PollOutcome};
