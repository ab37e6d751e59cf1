//! Challenge/response signature authentication
//!
//! This crate implements the request-gating half of the relay service:
//!
//! - [`NonceStore`] - single-use challenge values scoped to
//!   (wallet address, purpose)
//! - [`Purpose`] / [`MessageParams`] - the registry of canonical
//!   human-readable messages users sign
//! - [`SignatureAuthenticator`] - EIP-191 signature verification with
//!   timestamp freshness and atomic nonce consumption
//! - [`RateLimiter`] - fixed-window counters over the shared store,
//!   gating nonce issuance and execution endpoints
//!
//! A request authenticates by signing the canonical message for its
//! purpose off-chain; the signature binds the wallet, the parameters, the
//! server timestamp and a nonce that can be consumed exactly once.

pub mod authenticator;
pub mod error;
pub mod message;
pub mod nonce;
pub mod rate_limit;

pub use authenticator::{SignatureAuthenticator, SignedClaim};
pub use error::{AuthError, Result};
pub use message::{canonical_message, MessageParams, Purpose};
pub use nonce::{IssuedNonce, NonceStore};
pub use rate_limit::{RateBucket, RateDecision, RateLimiter};
