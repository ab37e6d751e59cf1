//! Shared application state
//!
//! One [`AppState`] is constructed at process start and handed to every
//! route handler. Service objects own their store handles; nothing in
//! the request path reaches for globals.

use std::sync::Arc;

use auth::{NonceStore, RateLimiter, SignatureAuthenticator};
use axum::http::HeaderMap;
use delegation::GrantStore;
use relay::{ChainGateway, MetaTransactionExecutor, SmartAccountResolver};
use store::KeyValueStore;

use crate::actions::{ActionRegistry, ContractsConfig};
use crate::config::GatewayConfig;

/// Everything the HTTP handlers need.
pub struct AppState {
    pub nonces: NonceStore,
    pub authenticator: SignatureAuthenticator,
    pub limiter: RateLimiter,
    pub grants: GrantStore,
    pub executor: MetaTransactionExecutor,
    pub actions: ActionRegistry,
    pub resolver: SmartAccountResolver,
}

impl AppState {
    /// Wire the service objects over an already-constructed store and
    /// chain gateway.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        chain: Arc<dyn ChainGateway>,
        config: &GatewayConfig,
    ) -> Self {
        Self::assemble(
            store,
            chain,
            &config.relay,
            config.contracts.clone(),
            &config.executor_identity,
        )
    }

    /// Assembly seam shared by the binary and integration tests.
    pub fn assemble(
        store: Arc<dyn KeyValueStore>,
        chain: Arc<dyn ChainGateway>,
        relay_config: &relay::RelayConfig,
        contracts: ContractsConfig,
        executor_identity: &str,
    ) -> Self {
        let resolver = SmartAccountResolver::new(relay_config.account_mode.clone());
        Self {
            nonces: NonceStore::new(Arc::clone(&store)),
            authenticator: SignatureAuthenticator::new(NonceStore::new(Arc::clone(&store))),
            limiter: RateLimiter::new(Arc::clone(&store)),
            grants: GrantStore::new(Arc::clone(&store), executor_identity),
            executor: MetaTransactionExecutor::new(chain, resolver.clone(), relay_config),
            actions: ActionRegistry::new(contracts),
            resolver,
        }
    }
}

/// Client identity for rate limiting and audit logs.
///
/// The service sits behind a proxy, so the forwarded header is
/// authoritative when present; its first hop is the original client.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "direct".to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_fallback() {
        assert_eq!(client_ip(&HeaderMap::new()), "direct");
    }
}
