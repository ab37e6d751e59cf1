//! Fixed-window rate limiting
//!
//! Counters live in the shared key-value store so the limit holds across
//! every request-handling process, not per instance. Each bucket has its
//! own window and ceiling: a burst against one action type cannot starve
//! another.
//!
//! Windows are wall-clock fixed, not sliding: the window index is part of
//! the counter key and the count resets exactly at the boundary. This
//! permits a burst of up to twice the ceiling straddling a boundary,
//! which is an accepted tradeoff for keeping the check a single atomic
//! increment.

use std::sync::Arc;
use std::time::Duration;

use store::KeyValueStore;
use tracing::warn;

use crate::error::Result;

/// Request classes with independent windows and ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateBucket {
    /// Nonce issuance
    Nonce,
    /// Delegation create/update/revoke
    Delegation,
    /// Destructive actions (burns)
    Destructive,
    /// Everything else
    General,
}

impl RateBucket {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nonce => "nonce",
            Self::Delegation => "delegation",
            Self::Destructive => "destructive",
            Self::General => "general",
        }
    }

    pub fn window(&self) -> Duration {
        match self {
            Self::Nonce => Duration::from_secs(60),
            Self::Delegation => Duration::from_secs(300),
            Self::Destructive => Duration::from_secs(300),
            Self::General => Duration::from_secs(60),
        }
    }

    pub fn ceiling(&self) -> u32 {
        match self {
            Self::Nonce => 20,
            Self::Delegation => 10,
            Self::Destructive => 5,
            Self::General => 120,
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the current window (0 when rejected)
    pub remaining: u32,
    /// Time until the current window resets
    pub reset_in: Duration,
}

/// Fixed-window counter over the shared store.
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Count this request against `(bucket, client identity)` and decide
    /// whether it may proceed.
    ///
    /// Identity is the caller's IP, optionally sharpened with the account
    /// address so one address cannot ride many IPs through account-scoped
    /// buckets.
    pub async fn check(
        &self,
        bucket: RateBucket,
        ip: &str,
        account: Option<&str>,
    ) -> Result<RateDecision> {
        let identity = match account {
            Some(account) => format!("{}:{}", ip, account.to_lowercase()),
            None => ip.to_string(),
        };
        self.count(bucket.name(), bucket.window(), bucket.ceiling(), &identity)
            .await
    }

    async fn count(
        &self,
        name: &str,
        window: Duration,
        ceiling: u32,
        identity: &str,
    ) -> Result<RateDecision> {
        let window_millis = window.as_millis() as i64;
        let now = chrono::Utc::now().timestamp_millis();
        let window_index = now.div_euclid(window_millis);
        let reset_in = Duration::from_millis(
            ((window_index + 1) * window_millis - now).max(1) as u64,
        );

        let key = format!("rl:{}:{}:{}", name, identity, window_index);

        // Counter keys embed the window index, so stale windows never
        // collide with the live one; double the window is TTL headroom.
        let count = self.store.increment(&key, window * 2).await?;

        let ceiling = ceiling as i64;
        if count > ceiling {
            warn!(
                "Rate limit exceeded: bucket={} identity={} count={} ceiling={}",
                name, identity, count, ceiling
            );
            return Ok(RateDecision {
                allowed: false,
                remaining: 0,
                reset_in,
            });
        }

        Ok(RateDecision {
            allowed: true,
            remaining: (ceiling - count) as u32,
            reset_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use store::MemoryStore;

    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_ceiling_enforced() {
        let limiter = limiter();

        for _ in 0..RateBucket::Destructive.ceiling() {
            let decision = limiter
                .check(RateBucket::Destructive, "10.0.0.1", None)
                .await
                .unwrap();
            assert!(decision.allowed);
        }

        let rejected = limiter
            .check(RateBucket::Destructive, "10.0.0.1", None)
            .await
            .unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert!(rejected.reset_in > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let limiter = limiter();

        for _ in 0..RateBucket::Destructive.ceiling() {
            limiter
                .check(RateBucket::Destructive, "10.0.0.1", None)
                .await
                .unwrap();
        }
        assert!(!limiter
            .check(RateBucket::Destructive, "10.0.0.1", None)
            .await
            .unwrap()
            .allowed);

        // Different IP, fresh quota.
        assert!(limiter
            .check(RateBucket::Destructive, "10.0.0.2", None)
            .await
            .unwrap()
            .allowed);
    }

    #[tokio::test]
    async fn test_buckets_are_independent() {
        let limiter = limiter();

        for _ in 0..RateBucket::Destructive.ceiling() + 1 {
            limiter
                .check(RateBucket::Destructive, "10.0.0.1", None)
                .await
                .unwrap();
        }

        // Exhausting the destructive bucket leaves the nonce bucket alone.
        assert!(limiter
            .check(RateBucket::Nonce, "10.0.0.1", None)
            .await
            .unwrap()
            .allowed);
    }

    #[tokio::test]
    async fn test_account_sharpens_identity() {
        let limiter = limiter();

        for _ in 0..RateBucket::Delegation.ceiling() {
            limiter
                .check(RateBucket::Delegation, "10.0.0.1", Some("0xAAA"))
                .await
                .unwrap();
        }
        assert!(!limiter
            .check(RateBucket::Delegation, "10.0.0.1", Some("0xAAA"))
            .await
            .unwrap()
            .allowed);

        // Same IP with another account is a different counter.
        assert!(limiter
            .check(RateBucket::Delegation, "10.0.0.1", Some("0xBBB"))
            .await
            .unwrap()
            .allowed);
    }

    #[tokio::test]
    async fn test_window_boundary_resets_count() {
        let limiter = limiter();
        let window = Duration::from_millis(200);

        // Exhaust a 2-request ceiling inside one window.
        assert!(limiter.count("t", window, 2, "ip").await.unwrap().allowed);
        assert!(limiter.count("t", window, 2, "ip").await.unwrap().allowed);
        let rejected = limiter.count("t", window, 2, "ip").await.unwrap();
        assert!(!rejected.allowed);
        assert!(rejected.reset_in <= window);

        // Once the window has elapsed the count starts over.
        tokio::time::sleep(window + Duration::from_millis(50)).await;
        assert!(limiter.count("t", window, 2, "ip").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_remaining_counts_down() {
        let limiter = limiter();
        let first = limiter
            .check(RateBucket::Nonce, "10.0.0.1", None)
            .await
            .unwrap();
        let second = limiter
            .check(RateBucket::Nonce, "10.0.0.1", None)
            .await
            .unwrap();
        assert_eq!(first.remaining, RateBucket::Nonce.ceiling() - 1);
        assert_eq!(second.remaining, RateBucket::Nonce.ceiling() - 2);
    }
}
