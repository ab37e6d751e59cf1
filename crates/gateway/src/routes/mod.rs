//! HTTP routes
//!
//! `/v1/auth/nonce`   GET    issue a signing challenge (rate-limited)
//! `/v1/delegation`   POST   create a grant (signed body)
//!                    GET    grant status summary
//!                    PATCH  add permissions (signed body)
//!                    DELETE revoke (signature in headers)
//! `/v1/execute`      POST   relay an action under a grant
//! `/healthz`         GET    liveness

pub mod delegation;
pub mod execute;
pub mod health;
pub mod nonce;

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;
use auth::RateBucket;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the gateway router over shared state.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/v1/auth/nonce", get(nonce::issue))
        .route(
            "/v1/delegation",
            post(delegation::create)
                .get(delegation::status)
                .patch(delegation::update)
                .delete(delegation::revoke),
        )
        .route("/v1/execute", post(execute::execute))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Parse a claimed wallet address, rejecting before any state is touched.
pub(crate) fn parse_wallet(value: &str) -> Result<Address, ApiError> {
    Address::from_str(value)
        .map_err(|_| ApiError::Validation(format!("Invalid wallet address '{}'", value)))
}

/// Count the request against a bucket, rejecting with 429 when over.
pub(crate) async fn enforce_rate(
    state: &AppState,
    bucket: RateBucket,
    ip: &str,
    account: Option<&str>,
) -> Result<(), ApiError> {
    let decision = state.limiter.check(bucket, ip, account).await?;
    if !decision.allowed {
        return Err(ApiError::RateLimited {
            reset_in: decision.reset_in,
        });
    }
    Ok(())
}
