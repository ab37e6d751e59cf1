//! Meta-transaction executor
//!
//! Relays a call batch as one smart-account operation:
//!
//! 1. resolve the executing account for the owner;
//! 2. estimate gas, falling back to conservative static limits when the
//!    estimator fails (account-abstraction submission paths are handled
//!    inconsistently by some providers, and an overpriced success beats a
//!    hard failure);
//! 3. submit exactly once - a second submission could double-execute a
//!    side-effecting call, so submission failure is terminal;
//! 4. poll for a receipt on a fixed interval up to a deadline; a timeout
//!    is reported as its own outcome carrying the transaction hash, never
//!    as a failure;
//! 5. check the operation's own success flag on the receipt.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tracing::{debug, info, warn};

use crate::account::SmartAccountResolver;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::gateway::{BatchCall, ChainGateway};
use crate::poll::{poll_until, PollOutcome};

/// A successfully relayed and confirmed operation.
#[derive(Debug, Clone)]
pub struct RelayedOperation {
    /// On-chain transaction hash
    pub tx_hash: String,
    /// Smart account that executed the batch
    pub account: Address,
    /// Gas limit the submission carried
    pub gas_limit: u64,
    /// Block the operation landed in
    pub block_number: Option<u64>,
}

/// Relays batched calls through the resolved smart account.
pub struct MetaTransactionExecutor {
    gateway: Arc<dyn ChainGateway>,
    resolver: SmartAccountResolver,
    gas_limit_multiplier: f64,
    fallback_gas_base: u64,
    fallback_gas_per_call: u64,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl MetaTransactionExecutor {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        resolver: SmartAccountResolver,
        config: &RelayConfig,
    ) -> Self {
        Self {
            gateway,
            resolver,
            gas_limit_multiplier: config.gas_limit_multiplier,
            fallback_gas_base: config.fallback_gas_base,
            fallback_gas_per_call: config.fallback_gas_per_call,
            poll_interval: Duration::from_secs(config.receipt_poll_interval_secs),
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
        }
    }

    /// Execute `calls` atomically as one on-chain operation for `owner`
    /// and wait for its receipt.
    ///
    /// # Errors
    ///
    /// - [`RelayError::EmptyBatch`] for an empty call list
    /// - [`RelayError::Submission`] when the network rejects the
    ///   operation (terminal; never retried here)
    /// - [`RelayError::Reverted`] when the operation mined but its own
    ///   execution failed
    /// - [`RelayError::ReceiptTimeout`] when no receipt arrived within
    ///   the deadline - the operation may still land
    pub async fn send_batched(
        &self,
        owner: Address,
        calls: Vec<BatchCall>,
    ) -> Result<RelayedOperation> {
        if calls.is_empty() {
            return Err(RelayError::EmptyBatch);
        }

        let account = self.resolver.resolve(owner);
        let gas_limit = self.gas_limit(account, &calls).await;

        let tx_hash = self.gateway.submit_batch(account, &calls, gas_limit).await?;
        let tx_hash_hex = format!("{:?}", tx_hash);
        info!(
            "Relayed {}-call batch for {:?} via {:?}: {}",
            calls.len(),
            owner,
            account,
            tx_hash_hex
        );

        let outcome = poll_until(self.poll_interval, self.receipt_timeout, || {
            self.gateway.fetch_receipt(tx_hash)
        })
        .await?;

        match outcome {
            PollOutcome::Complete(receipt) if receipt.success => {
                debug!(
                    "Operation {} confirmed in block {:?}",
                    tx_hash_hex, receipt.block_number
                );
                Ok(RelayedOperation {
                    tx_hash: tx_hash_hex,
                    account,
                    gas_limit,
                    block_number: receipt.block_number,
                })
            }
            PollOutcome::Complete(_) => {
                warn!("Operation {} mined but reverted internally", tx_hash_hex);
                Err(RelayError::Reverted {
                    tx_hash: tx_hash_hex,
                })
            }
            PollOutcome::TimedOut => {
                warn!(
                    "No receipt for {} after {}s; operation may still land",
                    tx_hash_hex,
                    self.receipt_timeout.as_secs()
                );
                Err(RelayError::ReceiptTimeout {
                    tx_hash: tx_hash_hex,
                    waited_secs: self.receipt_timeout.as_secs(),
                })
            }
        }
    }

    /// Gas limit for the submission: a padded estimate when the network
    /// cooperates, static fallback limits when it does not. Estimation
    /// failure is absorbed here and never surfaced to callers.
    async fn gas_limit(&self, account: Address, calls: &[BatchCall]) -> u64 {
        match self.gateway.estimate_batch(account, calls).await {
            Ok(estimate) => {
                let padded = (estimate as f64 * self.gas_limit_multiplier) as u64;
                debug!("Gas estimate {} padded to {}", estimate, padded);
                padded
            }
            Err(e) => {
                let fallback =
                    self.fallback_gas_base + self.fallback_gas_per_call * calls.len() as u64;
                warn!(
                    "Gas estimation failed ({}); using static fallback limit {}",
                    e, fallback
                );
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use alloy::primitives::{Bytes, TxHash, U256};
    use async_trait::async_trait;

    use super::*;
    use crate::account::AccountMode;
    use crate::gateway::OperationReceipt;

    const HASH: TxHash = TxHash::repeat_byte(0x42);

    /// Scripted gateway recording what the executor asked of it.
    struct ScriptedGateway {
        fail_estimation: bool,
        fail_submission: bool,
        receipt_success: bool,
        /// Receipt appears after this many polls; `None` never yields one
        receipt_after_polls: Option<u32>,
        estimate: u64,
        polls: AtomicU32,
        submitted_gas: Mutex<Option<u64>>,
        submissions: AtomicU32,
    }

    impl ScriptedGateway {
        fn confirming() -> Self {
            Self {
                fail_estimation: false,
                fail_submission: false,
                receipt_success: true,
                receipt_after_polls: Some(0),
                estimate: 100_000,
                polls: AtomicU32::new(0),
                submitted_gas: Mutex::new(None),
                submissions: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ChainGateway for ScriptedGateway {
        async fn estimate_batch(&self, _account: Address, _calls: &[BatchCall]) -> Result<u64> {
            if self.fail_estimation {
                Err(RelayError::Estimation("eth_estimateGas rejected".to_string()))
            } else {
                Ok(self.estimate)
            }
        }

        async fn submit_batch(
            &self,
            _account: Address,
            _calls: &[BatchCall],
            gas_limit: u64,
        ) -> Result<TxHash> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            if self.fail_submission {
                return Err(RelayError::Submission("insufficient funds".to_string()));
            }
            *self.submitted_gas.lock().unwrap() = Some(gas_limit);
            Ok(HASH)
        }

        async fn fetch_receipt(&self, tx_hash: TxHash) -> Result<Option<OperationReceipt>> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);
            match self.receipt_after_polls {
                Some(after) if poll >= after => Ok(Some(OperationReceipt {
                    tx_hash,
                    block_number: Some(1234),
                    success: self.receipt_success,
                })),
                _ => Ok(None),
            }
        }
    }

    fn executor(gateway: Arc<ScriptedGateway>) -> MetaTransactionExecutor {
        let config = RelayConfig {
            gas_limit_multiplier: 1.5,
            fallback_gas_base: 1_000_000,
            fallback_gas_per_call: 300_000,
            receipt_poll_interval_secs: 1,
            receipt_timeout_secs: 2,
            ..Default::default()
        };
        MetaTransactionExecutor::new(
            gateway,
            SmartAccountResolver::new(AccountMode::Shared {
                account: Address::repeat_byte(0xEE),
            }),
            &config,
        )
    }

    fn one_call() -> Vec<BatchCall> {
        vec![BatchCall {
            to: Address::repeat_byte(0x01),
            value: U256::ZERO,
            data: Bytes::from(vec![0xde, 0xad]),
        }]
    }

    fn two_calls() -> Vec<BatchCall> {
        let mut calls = one_call();
        calls.push(BatchCall {
            to: Address::repeat_byte(0x02),
            value: U256::from(5u64),
            data: Bytes::new(),
        });
        calls
    }

    #[tokio::test]
    async fn test_confirmed_relay_returns_hash() {
        let gateway = Arc::new(ScriptedGateway::confirming());
        let relayed = executor(Arc::clone(&gateway))
            .send_batched(Address::repeat_byte(0xAA), one_call())
            .await
            .unwrap();

        assert_eq!(relayed.tx_hash, format!("{:?}", HASH));
        assert_eq!(relayed.account, Address::repeat_byte(0xEE));
        assert_eq!(relayed.block_number, Some(1234));
        // Estimate 100k padded by the 1.5 multiplier.
        assert_eq!(relayed.gas_limit, 150_000);
    }

    #[tokio::test]
    async fn test_estimation_failure_falls_back_to_static_limits() {
        let gateway = Arc::new(ScriptedGateway {
            fail_estimation: true,
            ..ScriptedGateway::confirming()
        });
        let relayed = executor(Arc::clone(&gateway))
            .send_batched(Address::repeat_byte(0xAA), two_calls())
            .await
            .unwrap();

        // The submission still went out, priced by the static limits:
        // base plus per-call for each of the two calls.
        assert_eq!(relayed.gas_limit, 1_600_000);
        assert_eq!(*gateway.submitted_gas.lock().unwrap(), Some(1_600_000));
        assert_eq!(relayed.tx_hash, format!("{:?}", HASH));
    }

    #[tokio::test]
    async fn test_submission_failure_is_terminal() {
        let gateway = Arc::new(ScriptedGateway {
            fail_submission: true,
            ..ScriptedGateway::confirming()
        });
        let result = executor(Arc::clone(&gateway))
            .send_batched(Address::repeat_byte(0xAA), one_call())
            .await;

        assert!(matches!(result, Err(RelayError::Submission(_))));
        // Exactly one attempt; nothing polled a receipt for a failed send.
        assert_eq!(gateway.submissions.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mined_but_reverted_is_distinct_failure() {
        let gateway = Arc::new(ScriptedGateway {
            receipt_success: false,
            ..ScriptedGateway::confirming()
        });
        let result = executor(gateway)
            .send_batched(Address::repeat_byte(0xAA), one_call())
            .await;

        match result {
            Err(RelayError::Reverted { tx_hash }) => {
                assert_eq!(tx_hash, format!("{:?}", HASH));
            }
            other => panic!("expected Reverted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receipt_delay_is_tolerated_within_deadline() {
        let gateway = Arc::new(ScriptedGateway {
            receipt_after_polls: Some(1),
            ..ScriptedGateway::confirming()
        });
        let relayed = executor(Arc::clone(&gateway))
            .send_batched(Address::repeat_byte(0xAA), one_call())
            .await
            .unwrap();

        assert_eq!(relayed.tx_hash, format!("{:?}", HASH));
        assert!(gateway.polls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_receipt_timeout_carries_hash() {
        let gateway = Arc::new(ScriptedGateway {
            receipt_after_polls: None,
            ..ScriptedGateway::confirming()
        });
        let result = executor(gateway)
            .send_batched(Address::repeat_byte(0xAA), one_call())
            .await;

        match result {
            Err(err @ RelayError::ReceiptTimeout { .. }) => {
                assert!(err.is_timeout());
                assert_eq!(err.tx_hash(), Some(format!("{:?}", HASH)).as_deref());
            }
            other => panic!("expected ReceiptTimeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_rejected_before_any_network_call() {
        let gateway = Arc::new(ScriptedGateway::confirming());
        let result = executor(Arc::clone(&gateway))
            .send_batched(Address::repeat_byte(0xAA), vec![])
            .await;

        assert!(matches!(result, Err(RelayError::EmptyBatch)));
        assert_eq!(gateway.submissions.load(Ordering::SeqCst), 0);
    }
}
