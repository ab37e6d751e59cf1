//! HTTP gateway for the delegated-authorization relay
//!
//! Exposes the nonce, delegation and execute endpoints over axum, wires
//! the stores and the executor together, and maps internal errors onto
//! the external status-code contract. All service handles are
//! dependency-injected through [`state::AppState`]; the binary in
//! `main.rs` constructs them once at startup.

pub mod actions;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use routes::app;
pub use state::AppState;
