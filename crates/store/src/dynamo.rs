//! DynamoDB-backed key-value store
//!
//! One table holds every record kind; the key prefix distinguishes them.
//! Item layout: `pk` (S, the key), `payload` (S, JSON), `cnt` (N, counter
//! records only), `expires_at` (N, epoch seconds, the table's TTL
//! attribute).
//!
//! DynamoDB TTL eviction is lazy (items can linger for hours past
//! expiry), so every read filters on `expires_at` itself. Atomicity of
//! `take` comes from `DeleteItem` with `ReturnValues=ALL_OLD`; atomicity
//! of `increment` from an `ADD` update expression. Both are single-item
//! DynamoDB operations, which the service relies on for replay and
//! budget protection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::kv::KeyValueStore;

/// Production store backed by a single DynamoDB table.
///
/// The client is injected by the host application, which owns its
/// lifecycle; this struct never constructs or caches global handles.
pub struct DynamoStore {
    client: Arc<Client>,
    table_name: String,
}

impl DynamoStore {
    /// Create a store facade over an existing DynamoDB client.
    pub fn new(client: Arc<Client>, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Verify the backing table is reachable.
    ///
    /// Used by the host at startup so misconfiguration fails fast instead
    /// of surfacing on the first user request.
    pub async fn probe(&self) -> Result<()> {
        self.client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("describe_table failed: {}", e)))?;
        debug!("DynamoDB table '{}' reachable", self.table_name);
        Ok(())
    }

    fn expiry_attr(ttl: Duration) -> AttributeValue {
        // DynamoDB TTL works in whole epoch seconds
        let expires_at = chrono::Utc::now().timestamp() + ttl.as_secs().max(1) as i64;
        AttributeValue::N(expires_at.to_string())
    }

    fn item_live(item: &std::collections::HashMap<String, AttributeValue>) -> bool {
        match item.get("expires_at") {
            Some(AttributeValue::N(n)) => n
                .parse::<i64>()
                .map(|expires_at| expires_at > chrono::Utc::now().timestamp())
                .unwrap_or(false),
            _ => true,
        }
    }

    fn extract_payload(
        key: &str,
        item: std::collections::HashMap<String, AttributeValue>,
    ) -> Result<Option<String>> {
        if !Self::item_live(&item) {
            debug!("Key '{}' present but past expiry, treating as absent", key);
            return Ok(None);
        }
        match item.get("payload") {
            Some(AttributeValue::S(payload)) => Ok(Some(payload.clone())),
            Some(_) => Err(StoreError::CorruptValue {
                key: key.to_string(),
                reason: "payload attribute is not a string".to_string(),
            }),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl KeyValueStore for DynamoStore {
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item("pk", AttributeValue::S(key.to_string()))
            .item("payload", AttributeValue::S(value.to_string()));

        if let Some(ttl) = ttl {
            request = request.item("expires_at", Self::expiry_attr(ttl));
        }

        request
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("put_item failed for '{}': {}", key, e)))?;

        debug!("Stored key '{}' ({} bytes)", key, value.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("pk", AttributeValue::S(key.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("get_item failed for '{}': {}", key, e)))?;

        match result.item {
            Some(item) => Self::extract_payload(key, item),
            None => Ok(None),
        }
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        // DeleteItem with ALL_OLD is the atomic fetch-and-delete: only one
        // of any number of concurrent callers receives the old item.
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("pk", AttributeValue::S(key.to_string()))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("delete_item failed for '{}': {}", key, e)))?;

        match result.attributes {
            Some(item) => Self::extract_payload(key, item),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("pk", AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("delete_item failed for '{}': {}", key, e)))?;

        debug!("Deleted key '{}'", key);
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("pk", AttributeValue::S(key.to_string()))
            .update_expression("SET expires_at = if_not_exists(expires_at, :exp) ADD cnt :one")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .expression_attribute_values(":exp", Self::expiry_attr(ttl))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("update_item failed for '{}': {}", key, e)))?;

        let attributes = result.attributes.ok_or_else(|| StoreError::Backend(format!(
            "update_item for '{}' returned no attributes",
            key
        )))?;

        match attributes.get("cnt") {
            Some(AttributeValue::N(n)) => {
                n.parse::<i64>().map_err(|e| StoreError::CorruptValue {
                    key: key.to_string(),
                    reason: format!("counter is not an integer: {}", e),
                })
            }
            _ => Err(StoreError::CorruptValue {
                key: key.to_string(),
                reason: "counter attribute missing after increment".to_string(),
            }),
        }
    }
}
