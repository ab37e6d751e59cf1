//! Delegation grant records and persistence
//!
//! Grants live in the shared key-value store as JSON with a TTL equal to
//! the grant duration. Expiry is enforced at read time as well: a grant
//! past `expires_at` is treated as absent even if the backend has not
//! evicted it yet.
//!
//! The usage counter is a sibling record incremented through the store's
//! atomic primitive. A JSON blob cannot be atomically incremented in
//! place through a generic key-value contract, and the budget increment
//! must be a single store operation. `get` merges the counter back into
//! the returned grant; this store is the sole writer of both records.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use store::KeyValueStore;
use tracing::{debug, info, warn};

use crate::error::{DelegationError, Result};
use crate::permission::Permission;

/// Longest delegation a user can create.
pub const MAX_DURATION_HOURS: u32 = 168;

/// Largest transaction budget a delegation can carry.
pub const MAX_TRANSACTION_BUDGET: u32 = 1000;

/// How the grant request was authenticated, kept for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantAuthMetadata {
    pub signed_at: i64,
    pub nonce: String,
    pub request_ip: String,
}

/// A time-boxed, permission-scoped authorization for the relayer to act
/// on a user's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationGrant {
    /// Owner wallet, lowercase 0x form (the canonical store key)
    pub user: String,
    /// Identity of the relayer the grant authorizes
    pub executor: String,
    pub created_at: i64,
    pub expires_at: i64,
    /// Transactions already relayed under this grant
    pub transactions_executed: u32,
    /// Ceiling on relayed transactions
    pub max_transactions: u32,
    pub permissions: Vec<Permission>,
    pub auth: GrantAuthMetadata,
}

impl DelegationGrant {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn hours_left(&self, now: i64) -> f64 {
        ((self.expires_at - now).max(0) as f64) / 3600.0
    }

    pub fn transactions_left(&self) -> u32 {
        self.max_transactions.saturating_sub(self.transactions_executed)
    }

    pub fn has_permission(&self, action: Permission) -> bool {
        self.permissions.contains(&action)
    }
}

/// Grant persistence over the shared store.
pub struct GrantStore {
    store: Arc<dyn KeyValueStore>,
    /// Executor identity stamped on every grant this service writes
    executor: String,
}

impl GrantStore {
    pub fn new(store: Arc<dyn KeyValueStore>, executor: impl Into<String>) -> Self {
        Self {
            store,
            executor: executor.into(),
        }
    }

    fn grant_key(user: &str) -> String {
        format!("delegation:{}", user.to_lowercase())
    }

    fn counter_key(user: &str) -> String {
        format!("delegation-used:{}", user.to_lowercase())
    }

    /// Create a grant, replacing any existing one for the user.
    ///
    /// The permission list is deduplicated; explicitly requested
    /// high-risk permissions are honored (the signed message carried them
    /// verbatim) but logged. The write is read back before the grant is
    /// acknowledged, so a silently failing store cannot leave the user
    /// believing a delegation exists.
    pub async fn create(
        &self,
        user: &str,
        duration_hours: u32,
        max_transactions: u32,
        permissions: Vec<Permission>,
        auth: GrantAuthMetadata,
    ) -> Result<DelegationGrant> {
        if duration_hours == 0 || duration_hours > MAX_DURATION_HOURS {
            return Err(DelegationError::InvalidDuration {
                hours: duration_hours,
            });
        }
        if max_transactions == 0 || max_transactions > MAX_TRANSACTION_BUDGET {
            return Err(DelegationError::InvalidBudget {
                requested: max_transactions,
            });
        }

        let mut deduped: Vec<Permission> = Vec::with_capacity(permissions.len());
        for permission in permissions {
            if !deduped.contains(&permission) {
                deduped.push(permission);
            }
        }
        if deduped.is_empty() {
            return Err(DelegationError::NoPermissions);
        }
        for permission in deduped.iter().filter(|p| p.is_high_risk()) {
            warn!(
                "Delegation for {} explicitly grants high-risk permission '{}'",
                user.to_lowercase(),
                permission
            );
        }

        let user = user.to_lowercase();
        let now = chrono::Utc::now().timestamp();
        let ttl = Duration::from_secs(duration_hours as u64 * 3600);
        let grant = DelegationGrant {
            user: user.clone(),
            executor: self.executor.clone(),
            created_at: now,
            expires_at: now + ttl.as_secs() as i64,
            transactions_executed: 0,
            max_transactions,
            permissions: deduped,
            auth,
        };

        // A replaced grant must not inherit the old one's usage.
        self.store.delete(&Self::counter_key(&user)).await?;
        self.store
            .put(
                &Self::grant_key(&user),
                &serde_json::to_string(&grant).map_err(store::StoreError::from)?,
                Some(ttl),
            )
            .await?;

        // Read back to confirm the write actually persisted.
        let persisted = self.load(&user).await?;
        match persisted {
            Some(read) if read.created_at == grant.created_at && read.user == grant.user => {}
            _ => return Err(DelegationError::PersistenceVerification(user)),
        }

        info!(
            "Created delegation for {}: {}h, {} transactions, permissions [{}]",
            grant.user,
            duration_hours,
            max_transactions,
            grant
                .permissions
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(grant)
    }

    /// Fetch the live grant for a user, usage merged in.
    ///
    /// Expired grants read as absent regardless of what the backend still
    /// holds.
    pub async fn get(&self, user: &str) -> Result<Option<DelegationGrant>> {
        let Some(mut grant) = self.load(user).await? else {
            return Ok(None);
        };
        if grant.is_expired(chrono::Utc::now().timestamp()) {
            debug!("Delegation for {} past expiry, treating as absent", grant.user);
            return Ok(None);
        }

        if let Some(raw) = self.store.get(&Self::counter_key(user)).await? {
            grant.transactions_executed = raw.parse().unwrap_or_else(|_| {
                warn!("Unreadable usage counter for {}, assuming 0", grant.user);
                0
            });
        }
        Ok(Some(grant))
    }

    /// Fail-closed permission check against the live grant.
    pub async fn has_permission(&self, user: &str, action: Permission) -> Result<bool> {
        Ok(crate::permission::permission_allows(
            self.get(user).await?.as_ref(),
            action,
        ))
    }

    /// Atomically count one relayed transaction against the grant.
    ///
    /// Called exactly once per successfully relayed transaction, after
    /// relay success. Failed relays never charge budget.
    pub async fn increment_usage(&self, user: &str) -> Result<u32> {
        let grant = self
            .get(user)
            .await?
            .ok_or_else(|| DelegationError::NoActiveGrant(user.to_lowercase()))?;

        let remaining = (grant.expires_at - chrono::Utc::now().timestamp()).max(1);
        let count = self
            .store
            .increment(&Self::counter_key(user), Duration::from_secs(remaining as u64))
            .await?;
        debug!(
            "Delegation usage for {}: {}/{}",
            grant.user, count, grant.max_transactions
        );
        Ok(count as u32)
    }

    /// Merge additional permissions into an existing grant.
    pub async fn add_permissions(
        &self,
        user: &str,
        add: Vec<Permission>,
    ) -> Result<DelegationGrant> {
        let mut grant = self
            .get(user)
            .await?
            .ok_or_else(|| DelegationError::NoActiveGrant(user.to_lowercase()))?;

        for permission in add {
            if !grant.permissions.contains(&permission) {
                if permission.is_high_risk() {
                    warn!(
                        "Adding high-risk permission '{}' to delegation for {}",
                        permission, grant.user
                    );
                }
                grant.permissions.push(permission);
            }
        }

        let remaining = (grant.expires_at - chrono::Utc::now().timestamp()).max(1);
        // The stored record keeps a zero counter; usage lives beside it.
        let mut stored = grant.clone();
        stored.transactions_executed = 0;
        self.store
            .put(
                &Self::grant_key(user),
                &serde_json::to_string(&stored).map_err(store::StoreError::from)?,
                Some(Duration::from_secs(remaining as u64)),
            )
            .await?;

        info!(
            "Updated delegation permissions for {}: [{}]",
            grant.user,
            grant
                .permissions
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(grant)
    }

    /// Delete a grant unconditionally. Revoking an absent grant is not an
    /// error; afterwards the user is indistinguishable from one that
    /// never delegated.
    pub async fn revoke(&self, user: &str) -> Result<()> {
        self.store.delete(&Self::grant_key(user)).await?;
        self.store.delete(&Self::counter_key(user)).await?;
        info!("Revoked delegation for {}", user.to_lowercase());
        Ok(())
    }

    async fn load(&self, user: &str) -> Result<Option<DelegationGrant>> {
        match self.store.get(&Self::grant_key(user)).await? {
            Some(raw) => Ok(Some(
                serde_json::from_str(&raw).map_err(store::StoreError::from)?,
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use store::MemoryStore;

    use super::*;

    const USER: &str = "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B";

    fn auth_meta() -> GrantAuthMetadata {
        GrantAuthMetadata {
            signed_at: chrono::Utc::now().timestamp(),
            nonce: "a".repeat(64),
            request_ip: "10.0.0.1".to_string(),
        }
    }

    fn grants() -> GrantStore {
        GrantStore::new(Arc::new(MemoryStore::new()), "atlas-relayer")
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let store = grants();
        let created = store
            .create(USER, 24, 50, vec![Permission::MintPassport], auth_meta())
            .await
            .unwrap();
        assert_eq!(created.user, USER.to_lowercase());
        assert_eq!(created.executor, "atlas-relayer");
        assert_eq!(created.transactions_executed, 0);

        let read = store.get(USER).await.unwrap().unwrap();
        assert_eq!(read.permissions, vec![Permission::MintPassport]);
        assert_eq!(read.max_transactions, 50);
        assert!(read.hours_left(chrono::Utc::now().timestamp()) > 23.9);
    }

    #[tokio::test]
    async fn test_create_validates_bounds() {
        let store = grants();
        assert!(matches!(
            store
                .create(USER, 0, 50, vec![Permission::MintPassport], auth_meta())
                .await,
            Err(DelegationError::InvalidDuration { .. })
        ));
        assert!(matches!(
            store
                .create(USER, 2000, 50, vec![Permission::MintPassport], auth_meta())
                .await,
            Err(DelegationError::InvalidDuration { .. })
        ));
        assert!(matches!(
            store
                .create(USER, 24, 0, vec![Permission::MintPassport], auth_meta())
                .await,
            Err(DelegationError::InvalidBudget { .. })
        ));
        assert!(matches!(
            store.create(USER, 24, 50, vec![], auth_meta()).await,
            Err(DelegationError::NoPermissions)
        ));
    }

    #[tokio::test]
    async fn test_create_dedupes_permissions() {
        let store = grants();
        let created = store
            .create(
                USER,
                24,
                50,
                vec![
                    Permission::MintPassport,
                    Permission::SendTours,
                    Permission::MintPassport,
                ],
                auth_meta(),
            )
            .await
            .unwrap();
        assert_eq!(
            created.permissions,
            vec![Permission::MintPassport, Permission::SendTours]
        );
    }

    #[tokio::test]
    async fn test_explicit_high_risk_permission_is_kept() {
        let store = grants();
        let created = store
            .create(USER, 24, 50, vec![Permission::BurnPassport], auth_meta())
            .await
            .unwrap();
        assert!(created.has_permission(Permission::BurnPassport));
    }

    #[tokio::test]
    async fn test_expired_grant_reads_as_absent() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = GrantStore::new(Arc::clone(&kv), "atlas-relayer");

        // Plant a grant whose logical expiry has passed but whose record
        // is still physically present (no store TTL).
        let now = chrono::Utc::now().timestamp();
        let grant = DelegationGrant {
            user: USER.to_lowercase(),
            executor: "atlas-relayer".to_string(),
            created_at: now - 7200,
            expires_at: now - 3600,
            transactions_executed: 0,
            max_transactions: 50,
            permissions: vec![Permission::MintPassport],
            auth: auth_meta(),
        };
        kv.put(
            &format!("delegation:{}", USER.to_lowercase()),
            &serde_json::to_string(&grant).unwrap(),
            None,
        )
        .await
        .unwrap();

        assert!(store.get(USER).await.unwrap().is_none());
        assert!(!store
            .has_permission(USER, Permission::MintPassport)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_usage_counter_merges_into_reads() {
        let store = grants();
        store
            .create(USER, 24, 3, vec![Permission::MintPassport], auth_meta())
            .await
            .unwrap();

        assert_eq!(store.increment_usage(USER).await.unwrap(), 1);
        assert_eq!(store.increment_usage(USER).await.unwrap(), 2);

        let read = store.get(USER).await.unwrap().unwrap();
        assert_eq!(read.transactions_executed, 2);
        assert_eq!(read.transactions_left(), 1);
    }

    #[tokio::test]
    async fn test_recreate_resets_usage() {
        let store = grants();
        store
            .create(USER, 24, 3, vec![Permission::MintPassport], auth_meta())
            .await
            .unwrap();
        store.increment_usage(USER).await.unwrap();
        store.increment_usage(USER).await.unwrap();

        store
            .create(USER, 24, 3, vec![Permission::MintPassport], auth_meta())
            .await
            .unwrap();
        let read = store.get(USER).await.unwrap().unwrap();
        assert_eq!(read.transactions_executed, 0);
    }

    #[tokio::test]
    async fn test_fail_closed_permission_check() {
        let store = grants();
        store
            .create(USER, 24, 50, vec![Permission::MintPassport], auth_meta())
            .await
            .unwrap();

        assert!(store
            .has_permission(USER, Permission::MintPassport)
            .await
            .unwrap());
        // Live, unexpired grant; action simply not granted.
        assert!(!store
            .has_permission(USER, Permission::SendTours)
            .await
            .unwrap());
        assert!(!store
            .has_permission(USER, Permission::BurnPassport)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_add_permissions_requires_live_grant() {
        let store = grants();
        assert!(matches!(
            store
                .add_permissions(USER, vec![Permission::SendTours])
                .await,
            Err(DelegationError::NoActiveGrant(_))
        ));

        store
            .create(USER, 24, 50, vec![Permission::MintPassport], auth_meta())
            .await
            .unwrap();
        let updated = store
            .add_permissions(USER, vec![Permission::SendTours, Permission::MintPassport])
            .await
            .unwrap();
        assert_eq!(
            updated.permissions,
            vec![Permission::MintPassport, Permission::SendTours]
        );
    }

    #[tokio::test]
    async fn test_add_permissions_preserves_usage() {
        let store = grants();
        store
            .create(USER, 24, 5, vec![Permission::MintPassport], auth_meta())
            .await
            .unwrap();
        store.increment_usage(USER).await.unwrap();

        store
            .add_permissions(USER, vec![Permission::SendTours])
            .await
            .unwrap();
        let read = store.get(USER).await.unwrap().unwrap();
        assert_eq!(read.transactions_executed, 1);
    }

    #[tokio::test]
    async fn test_revoked_grant_is_indistinguishable_from_absent() {
        let store = grants();
        store
            .create(USER, 24, 50, vec![Permission::MintPassport], auth_meta())
            .await
            .unwrap();
        store.increment_usage(USER).await.unwrap();

        store.revoke(USER).await.unwrap();
        assert!(store.get(USER).await.unwrap().is_none());
        assert!(!store
            .has_permission(USER, Permission::MintPassport)
            .await
            .unwrap());

        // Revoking again is a no-op, same as a user who never delegated.
        store.revoke(USER).await.unwrap();
    }
}
