//! Delegation grants and permission scoping
//!
//! A delegation grant lets the platform relayer act for a user without
//! per-transaction signing: time-boxed, capped to a transaction budget,
//! and scoped to an explicit allow-list of actions. Anything not granted
//! is denied.
//!
//! - [`Permission`] - the single registry of delegable action names
//! - [`DelegationGrant`] - the persisted grant record
//! - [`GrantStore`] - create / read / merge / increment / revoke over the
//!   shared key-value store

pub mod error;
pub mod grant;
pub mod permission;

pub use error::{DelegationError, Result};
pub use grant::{DelegationGrant, GrantAuthMetadata, GrantStore, MAX_DURATION_HOURS, MAX_TRANSACTION_BUDGET};
pub use permission::{permission_allows, Permission};
