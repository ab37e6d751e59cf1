//! Single-use challenge nonces
//!
//! A nonce binds one signature to one request. Issued on demand, stored
//! under (address, purpose) with a short TTL, and consumed through the
//! store's atomic fetch-and-delete so two concurrent verifications can
//! never both observe it.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use store::KeyValueStore;
use tracing::debug;

use crate::error::Result;
use crate::message::Purpose;

/// Nonces expire a few minutes after issuance if never used.
pub const NONCE_TTL: Duration = Duration::from_secs(300);

/// Persisted challenge record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNonce {
    pub nonce: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Freshly issued challenge, returned to the client together with the
/// message template it will be embedded in.
#[derive(Debug, Clone)]
pub struct IssuedNonce {
    pub nonce: String,
    pub timestamp: i64,
    pub message_template: String,
    pub expires_in_seconds: u64,
}

/// Issues and consumes single-use challenge values.
pub struct NonceStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl NonceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ttl: NONCE_TTL,
        }
    }

    /// Override the nonce TTL. Intended for tests.
    pub fn with_ttl(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(address: &str, purpose: Purpose) -> String {
        format!("nonce:{}:{}", address.to_lowercase(), purpose.key())
    }

    /// Issue a fresh nonce for (address, purpose), replacing any earlier
    /// unconsumed one.
    pub async fn issue(&self, address: &str, purpose: Purpose) -> Result<IssuedNonce> {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let nonce = hex::encode(bytes);

        let issued_at = chrono::Utc::now().timestamp();
        let record = StoredNonce {
            nonce: nonce.clone(),
            issued_at,
            expires_at: issued_at + self.ttl.as_secs() as i64,
        };

        self.store
            .put(
                &Self::key(address, purpose),
                &serde_json::to_string(&record).map_err(store::StoreError::from)?,
                Some(self.ttl),
            )
            .await?;

        debug!(
            "Issued {} nonce for {} (expires in {}s)",
            purpose,
            address.to_lowercase(),
            self.ttl.as_secs()
        );

        Ok(IssuedNonce {
            message_template: purpose.message_template(address, issued_at, &nonce),
            nonce,
            timestamp: issued_at,
            expires_in_seconds: self.ttl.as_secs(),
        })
    }

    /// Atomically fetch and destroy the stored nonce for
    /// (address, purpose).
    ///
    /// Whatever the caller decides about the returned record, the nonce is
    /// gone: a failed comparison burns it just like a successful one.
    pub async fn consume(&self, address: &str, purpose: Purpose) -> Result<Option<StoredNonce>> {
        let key = Self::key(address, purpose);
        let Some(payload) = self.store.take(&key).await? else {
            return Ok(None);
        };

        let record: StoredNonce =
            serde_json::from_str(&payload).map_err(store::StoreError::from)?;

        // The store's TTL filter already hides expired entries; this check
        // only guards backends with coarser expiry resolution.
        if record.expires_at <= chrono::Utc::now().timestamp() {
            debug!("Consumed nonce for {} was already expired", key);
            return Ok(None);
        }
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use store::MemoryStore;

    use super::*;

    fn nonces() -> NonceStore {
        NonceStore::new(Arc::new(MemoryStore::new()))
    }

    const ADDR: &str = "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B";

    #[tokio::test]
    async fn test_issue_then_consume_once() {
        let store = nonces();
        let issued = store.issue(ADDR, Purpose::DelegationCreate).await.unwrap();
        assert_eq!(issued.nonce.len(), 64);
        assert_eq!(issued.expires_in_seconds, NONCE_TTL.as_secs());

        let consumed = store
            .consume(ADDR, Purpose::DelegationCreate)
            .await
            .unwrap()
            .expect("nonce should be live");
        assert_eq!(consumed.nonce, issued.nonce);

        // Second consumption finds nothing.
        assert!(store
            .consume(ADDR, Purpose::DelegationCreate)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_purpose_scoping() {
        let store = nonces();
        store.issue(ADDR, Purpose::DelegationCreate).await.unwrap();

        // A nonce issued for creation is invisible to revocation.
        assert!(store
            .consume(ADDR, Purpose::DelegationRevoke)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .consume(ADDR, Purpose::DelegationCreate)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_address_case_insensitive() {
        let store = nonces();
        store.issue(ADDR, Purpose::PassportBurn).await.unwrap();
        assert!(store
            .consume(&ADDR.to_uppercase().replace("0X", "0x"), Purpose::PassportBurn)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_reissue_replaces_previous_nonce() {
        let store = nonces();
        let first = store.issue(ADDR, Purpose::DelegationCreate).await.unwrap();
        let second = store.issue(ADDR, Purpose::DelegationCreate).await.unwrap();
        assert_ne!(first.nonce, second.nonce);

        let consumed = store
            .consume(ADDR, Purpose::DelegationCreate)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(consumed.nonce, second.nonce);
    }

    #[tokio::test]
    async fn test_expired_nonce_is_absent() {
        let store = NonceStore::with_ttl(
            Arc::new(MemoryStore::new()),
            Duration::from_millis(30),
        );
        store.issue(ADDR, Purpose::DelegationCreate).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store
            .consume(ADDR, Purpose::DelegationCreate)
            .await
            .unwrap()
            .is_none());
    }
}
