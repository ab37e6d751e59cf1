//! Nonce issuance

use std::sync::Arc;

use auth::{Purpose, RateBucket};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::{enforce_rate, parse_wallet};
use crate::state::{client_ip, AppState};

#[derive(Debug, Deserialize)]
pub struct NonceQuery {
    address: String,
    purpose: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    nonce: String,
    timestamp: i64,
    message_to_sign: String,
    expires_in_seconds: u64,
}

/// `GET /v1/auth/nonce?address=&purpose=`
pub async fn issue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<NonceQuery>,
) -> Result<Json<NonceResponse>, ApiError> {
    parse_wallet(&query.address)?;
    let purpose: Purpose = query
        .purpose
        .parse()
        .map_err(|e: String| ApiError::Validation(e))?;

    let ip = client_ip(&headers);
    enforce_rate(&state, RateBucket::Nonce, &ip, Some(&query.address)).await?;

    let issued = state.nonces.issue(&query.address, purpose).await?;
    Ok(Json(NonceResponse {
        nonce: issued.nonce,
        timestamp: issued.timestamp,
        message_to_sign: issued.message_template,
        expires_in_seconds: issued.expires_in_seconds,
    }))
}
