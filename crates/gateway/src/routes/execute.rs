//! Action execution under a delegation grant
//!
//! No per-request signature: authorization is the live grant itself.
//! Checks run fail-closed, in order: grant exists, action permitted,
//! budget left. Budget is charged only after the relay confirms.

use std::sync::Arc;

use auth::RateBucket;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::routes::{enforce_rate, parse_wallet};
use crate::state::{client_ip, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    user_address: String,
    action: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    tx_hash: String,
    /// "confirmed" once the receipt proved success; "pending" when the
    /// receipt wait timed out and the operation may still land
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    transactions_left: Option<u32>,
}

/// `POST /v1/execute`
pub async fn execute(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ExecuteRequest>,
) -> Result<Response, ApiError> {
    let owner = parse_wallet(&request.user_address)?;
    let action = state.actions.resolve(&request.action)?;

    let ip = client_ip(&headers);
    let bucket = if action.is_high_risk() {
        RateBucket::Destructive
    } else {
        RateBucket::General
    };
    enforce_rate(&state, bucket, &ip, Some(&request.user_address)).await?;

    let grant = state
        .grants
        .get(&request.user_address)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| {
            ApiError::Authorization("No active delegation for this address".to_string())
        })?;

    if !grant.has_permission(action) {
        return Err(ApiError::Authorization(format!(
            "Delegation does not include permission '{}'",
            action
        )));
    }
    if grant.transactions_left() == 0 {
        return Err(ApiError::Authorization(
            "Delegation transaction budget exhausted".to_string(),
        ));
    }

    let smart_account = state.resolver.resolve(owner);
    let calls = state
        .actions
        .build_calls(action, owner, smart_account, &request.params)?;

    match state.executor.send_batched(owner, calls).await {
        Ok(relayed) => {
            // Charge budget only now, after the relay confirmed; failed
            // relays never consume it.
            let transactions_left = match state.grants.increment_usage(&request.user_address).await
            {
                Ok(used) => Some(grant.max_transactions.saturating_sub(used)),
                Err(e) => {
                    warn!(
                        "Relay for {} confirmed but usage increment failed: {}",
                        grant.user, e
                    );
                    None
                }
            };
            info!(
                "Executed '{}' for {} -> {}",
                action, grant.user, relayed.tx_hash
            );
            Ok(Json(ExecuteResponse {
                tx_hash: relayed.tx_hash,
                status: "confirmed",
                transactions_left,
            })
            .into_response())
        }
        Err(err) if err.is_timeout() => {
            // Distinct from failure: the operation was submitted and may
            // still land. Hand the hash back so the caller can keep
            // watching on their own.
            let tx_hash = err.tx_hash().unwrap_or_default().to_string();
            info!(
                "Execution of '{}' for {} pending past deadline: {}",
                action, grant.user, tx_hash
            );
            Ok((
                StatusCode::ACCEPTED,
                Json(ExecuteResponse {
                    tx_hash,
                    status: "pending",
                    transactions_left: None,
                }),
            )
                .into_response())
        }
        Err(err) => Err(ApiError::Relay(err)),
    }
}
