//! Key-value store contract
//!
//! The trait below is the single seam between the service and its durable
//! state. Handlers never coordinate concurrent requests with in-process
//! locks; correctness of nonce single-use and budget ceilings rests
//! entirely on the atomicity guarantees documented here.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Atomic key-value primitives shared by all request-handling processes.
///
/// Every implementation MUST provide these guarantees:
///
/// - [`take`](Self::take) is a single atomic fetch-and-delete. Two
///   concurrent calls for the same key must never both observe the value.
///   A read followed by a separate delete does not satisfy this contract.
/// - [`increment`](Self::increment) is a single atomic read-modify-write
///   returning the post-increment count.
/// - Entries written with a TTL are absent from reads once expired, even
///   if the backend has not physically evicted them yet.
///
/// Values are JSON-encoded strings; the store does not interpret them.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write `value` at `key`, replacing any previous value.
    ///
    /// With `ttl` set, the entry expires that far from now.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Read the value at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Atomically fetch and delete the value at `key`.
    ///
    /// Returns `None` if the key was absent or expired. After this call
    /// returns `Some`, no other caller can ever observe the value.
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// Delete the value at `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomically increment the counter at `key` by one and return the
    /// new count. A missing counter starts at zero.
    ///
    /// The TTL applies only when the increment creates the counter; it is
    /// not extended on subsequent increments, so a counter expires a fixed
    /// time after its first increment.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64>;
}
