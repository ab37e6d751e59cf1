use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use gateway::config::{GatewayConfig, StoreBackend};
use gateway::state::AppState;
use relay::{AlloyGateway, ChainGateway};
use store::{DynamoStore, KeyValueStore, MemoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    gateway::logging::init();

    let config = GatewayConfig::from_env()?;

    // Fail fast on a broken relayer key instead of on the first relay.
    let relayer = config
        .relay
        .relayer_address()
        .map_err(|e| anyhow!("Relayer key check failed: {}", e))?;
    info!("Relayer address: {:?}", relayer);
    info!(
        "Chain {} via {} ({} accounts)",
        config.relay.chain_id,
        config.relay.rpc_url,
        match config.relay.account_mode {
            relay::AccountMode::Shared { .. } => "shared",
            relay::AccountMode::Derived { .. } => "derived",
        }
    );

    let store: Arc<dyn KeyValueStore> = match config.store_backend {
        StoreBackend::Dynamo => {
            let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let client = Arc::new(aws_sdk_dynamodb::Client::new(&aws));
            let store = DynamoStore::new(client, config.table_name.clone());
            store
                .probe()
                .await
                .map_err(|e| anyhow!("Store probe failed: {}", e))?;
            info!("Connected to DynamoDB table '{}'", config.table_name);
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store: state is lost on restart and not shared across processes");
            Arc::new(MemoryStore::new())
        }
    };

    let chain: Arc<dyn ChainGateway> = Arc::new(AlloyGateway::new(config.relay.clone())?);
    let state = Arc::new(AppState::new(store, chain, &config));
    let app = gateway::app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Gateway listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
