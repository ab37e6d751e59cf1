//! Logging initialization
//!
//! Console logging through `tracing-subscriber`, filtered by `RUST_LOG`
//! with an `info` default. Kept deliberately small: the deployment
//! environment scrapes stdout.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Safe to call once per process; later calls are ignored so tests that
/// share a binary do not panic.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
