//! In-memory key-value store
//!
//! Backs tests and single-process local development. Atomicity of `take`
//! and `increment` comes from holding the map lock across the whole
//! operation; expiry is enforced at read time like the DynamoDB store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::kv::KeyValueStore;

#[derive(Debug, Clone)]
struct Entry {
    payload: Option<String>,
    count: i64,
    expires_at_ms: Option<i64>,
}

impl Entry {
    fn live(&self, now_ms: i64) -> bool {
        self.expires_at_ms.map(|at| at > now_ms).unwrap_or(true)
    }
}

/// Process-local store with the same observable semantics as
/// [`DynamoStore`](crate::DynamoStore).
///
/// Expiry is tracked in milliseconds so tests can use sub-second TTLs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Number of live entries, for assertions in tests.
    pub fn len(&self) -> usize {
        let now = Self::now_ms();
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.values().filter(|e| e.live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let expires_at_ms = ttl.map(|ttl| Self::now_ms() + ttl.as_millis() as i64);
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(
            key.to_string(),
            Entry {
                payload: Some(value.to_string()),
                count: 0,
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Self::now_ms();
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries
            .get(key)
            .filter(|e| e.live(now))
            .and_then(|e| e.payload.clone()))
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let now = Self::now_ms();
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Remove-then-inspect under one lock: the second of two racing
        // callers finds nothing.
        Ok(entries
            .remove(key)
            .filter(|e| e.live(now))
            .and_then(|e| e.payload))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64> {
        let now = Self::now_ms();
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            payload: None,
            count: 0,
            expires_at_ms: None,
        });
        if !entry.live(now) {
            // Expired counter restarts from zero, as the lazily-evicting
            // backend would present it.
            entry.count = 0;
            entry.expires_at_ms = None;
        }
        if entry.expires_at_ms.is_none() {
            entry.expires_at_ms = Some(now + ttl.as_millis() as i64);
        }
        entry.count += 1;
        Ok(entry.count)
    }
}
