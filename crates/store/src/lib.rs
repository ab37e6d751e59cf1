//! Shared key-value persistence layer
//!
//! All durable state in the relay service (nonces, delegation grants,
//! rate-limit counters) lives in one externally reachable key-value store
//! that every request-handling process talks to. This crate defines the
//! [`KeyValueStore`] trait with the atomic primitives the rest of the
//! system is allowed to assume, plus two implementations:
//!
//! - [`DynamoStore`] - DynamoDB-backed production store
//! - [`MemoryStore`] - in-process store for tests and local development

pub mod dynamo;
pub mod error;
pub mod kv;
pub mod memory;

pub use dynamo::DynamoStore;
pub use error::{Result, StoreError};
pub use kv::KeyValueStore;
pub use memory::MemoryStore;
