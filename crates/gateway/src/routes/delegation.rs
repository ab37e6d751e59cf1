//! Delegation lifecycle routes

use std::sync::Arc;

use auth::{canonical_message, MessageParams, Purpose, RateBucket, SignedClaim};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use delegation::{DelegationError, GrantAuthMetadata, Permission};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::{enforce_rate, parse_wallet};
use crate::state::{client_ip, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDelegationRequest {
    user_address: String,
    signature: String,
    timestamp: i64,
    nonce: String,
    duration_hours: u32,
    max_transactions: u32,
    /// Empty means the default (non-high-risk) permission set
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationResponse {
    user: String,
    expires_at: i64,
    max_transactions: u32,
    permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum StatusResponse {
    Active {
        active: bool,
        user: String,
        executor: String,
        expires_at: i64,
        hours_left: f64,
        transactions_executed: u32,
        transactions_left: u32,
        max_transactions: u32,
        permissions: Vec<String>,
    },
    Absent {
        active: bool,
        message: String,
    },
}

/// `POST /v1/delegation`
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateDelegationRequest>,
) -> Result<Json<DelegationResponse>, ApiError> {
    parse_wallet(&request.user_address)?;
    let ip = client_ip(&headers);
    enforce_rate(&state, RateBucket::Delegation, &ip, Some(&request.user_address)).await?;

    let permissions = resolve_permissions(&request.permissions, true)?;
    let message = canonical_message(
        &MessageParams::DelegationCreate {
            duration_hours: request.duration_hours,
            max_transactions: request.max_transactions,
            permissions: permission_names(&permissions),
        },
        &request.user_address,
        request.timestamp,
        &request.nonce,
    );

    let claim = SignedClaim {
        address: request.user_address.clone(),
        signature: request.signature.clone(),
        timestamp: request.timestamp,
        nonce: request.nonce.clone(),
    };
    state
        .authenticator
        .authenticate(&claim, Purpose::DelegationCreate, &message, true)
        .await?;

    let grant = state
        .grants
        .create(
            &request.user_address,
            request.duration_hours,
            request.max_transactions,
            permissions,
            GrantAuthMetadata {
                signed_at: request.timestamp,
                nonce: request.nonce,
                request_ip: ip,
            },
        )
        .await
        .map_err(delegation_error)?;

    Ok(Json(DelegationResponse {
        user: grant.user,
        expires_at: grant.expires_at,
        max_transactions: grant.max_transactions,
        permissions: permission_names(&grant.permissions),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    address: String,
}

/// `GET /v1/delegation?address=`
pub async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AddressQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    parse_wallet(&query.address)?;
    let ip = client_ip(&headers);
    enforce_rate(&state, RateBucket::General, &ip, None).await?;

    let response = match state.grants.get(&query.address).await.map_err(delegation_error)? {
        Some(grant) => {
            let now = chrono::Utc::now().timestamp();
            StatusResponse::Active {
                active: true,
                executor: grant.executor.clone(),
                hours_left: (grant.hours_left(now) * 10.0).round() / 10.0,
                transactions_executed: grant.transactions_executed,
                transactions_left: grant.transactions_left(),
                max_transactions: grant.max_transactions,
                permissions: permission_names(&grant.permissions),
                expires_at: grant.expires_at,
                user: grant.user,
            }
        }
        None => StatusResponse::Absent {
            active: false,
            message: "No active delegation".to_string(),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDelegationRequest {
    user_address: String,
    signature: String,
    timestamp: i64,
    nonce: String,
    add_permissions: Vec<String>,
}

/// `PATCH /v1/delegation`
pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<UpdateDelegationRequest>,
) -> Result<Json<DelegationResponse>, ApiError> {
    parse_wallet(&request.user_address)?;
    let ip = client_ip(&headers);
    enforce_rate(&state, RateBucket::Delegation, &ip, Some(&request.user_address)).await?;

    let add = resolve_permissions(&request.add_permissions, false)?;
    // A distinct purpose key: a stale delegation-creation signature can
    // never satisfy a permission update.
    let message = canonical_message(
        &MessageParams::DelegationUpdate {
            add_permissions: permission_names(&add),
        },
        &request.user_address,
        request.timestamp,
        &request.nonce,
    );

    let claim = SignedClaim {
        address: request.user_address.clone(),
        signature: request.signature.clone(),
        timestamp: request.timestamp,
        nonce: request.nonce.clone(),
    };
    state
        .authenticator
        .authenticate(&claim, Purpose::DelegationUpdate, &message, true)
        .await?;

    let grant = state
        .grants
        .add_permissions(&request.user_address, add)
        .await
        .map_err(delegation_error)?;

    Ok(Json(DelegationResponse {
        user: grant.user,
        expires_at: grant.expires_at,
        max_transactions: grant.max_transactions,
        permissions: permission_names(&grant.permissions),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeResponse {
    user: String,
    revoked: bool,
}

/// `DELETE /v1/delegation?address=`
///
/// DELETE requests commonly carry no body, so the signature rides in
/// `x-signature` / `x-timestamp` / `x-nonce` headers.
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AddressQuery>,
) -> Result<Json<RevokeResponse>, ApiError> {
    parse_wallet(&query.address)?;
    let ip = client_ip(&headers);
    enforce_rate(&state, RateBucket::Delegation, &ip, Some(&query.address)).await?;

    let signature = required_header(&headers, "x-signature")?;
    let timestamp: i64 = required_header(&headers, "x-timestamp")?
        .parse()
        .map_err(|_| ApiError::Validation("x-timestamp is not a unix timestamp".to_string()))?;
    let nonce = required_header(&headers, "x-nonce")?;

    let message = canonical_message(
        &MessageParams::DelegationRevoke,
        &query.address,
        timestamp,
        &nonce,
    );
    let claim = SignedClaim {
        address: query.address.clone(),
        signature,
        timestamp,
        nonce,
    };
    state
        .authenticator
        .authenticate(&claim, Purpose::DelegationRevoke, &message, true)
        .await?;

    state
        .grants
        .revoke(&query.address)
        .await
        .map_err(delegation_error)?;

    Ok(Json(RevokeResponse {
        user: query.address.to_lowercase(),
        revoked: true,
    }))
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .ok_or_else(|| ApiError::Validation(format!("Missing required header '{}'", name)))
}

/// Parse requested permission names, substituting the registry default
/// when creation gets an empty list.
fn resolve_permissions(
    names: &[String],
    default_on_empty: bool,
) -> Result<Vec<Permission>, ApiError> {
    if names.is_empty() {
        if default_on_empty {
            return Ok(Permission::default_grant());
        }
        return Err(ApiError::Validation(
            "At least one permission is required".to_string(),
        ));
    }
    names
        .iter()
        .map(|name| {
            name.parse::<Permission>()
                .map_err(|e| ApiError::Validation(e.to_string()))
        })
        .collect()
}

fn permission_names(permissions: &[Permission]) -> Vec<String> {
    permissions.iter().map(|p| p.as_str().to_string()).collect()
}

fn delegation_error(err: DelegationError) -> ApiError {
    match err {
        DelegationError::NoActiveGrant(user) => {
            ApiError::NotFound(format!("No active delegation for {}", user))
        }
        e if e.is_client_fault() => ApiError::Validation(e.to_string()),
        e => ApiError::Internal(e.to_string()),
    }
}
