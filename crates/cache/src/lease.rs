//! Per-scope exclusive lease guarding automation runs.
//!
//! Acquisition is non-blocking: a run that finds the lease held must skip,
//! not queue, because overlapping runs against the same scope could race on
//! the same entities' status. The TTL guarantees forward progress if a
//! holder crashes without releasing.

use async_trait::async_trait;
use autoads_core::config::RedisConfig;
use autoads_core::error::{AutoAdsError, AutoAdsResult};
use autoads_core::matching::normalize;
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Lease scope for one automation run: the account plus an optional
/// narrowing key (e.g. the schedule's match key), normalized so cosmetic
/// variations land on the same lock.
pub fn run_scope_key(account_id: &str, narrowing: &str) -> String {
    let narrowed = normalize(narrowing).replace(' ', "-");
    format!("lock:onoff:{account_id}:{narrowed}")
}

/// A held lease. Carries a token so a release can never delete a lease
/// that expired and was re-acquired by someone else.
#[derive(Debug, Clone)]
pub struct Lease {
    pub scope_key: String,
    pub token: String,
}

#[derive(Debug)]
pub enum LeaseOutcome {
    Held(Lease),
    Contended,
}

impl LeaseOutcome {
    pub fn is_held(&self) -> bool {
        matches!(self, Self::Held(_))
    }
}

#[async_trait]
pub trait LeaseService: Send + Sync {
    /// Attempt to acquire the lease. Never blocks or queues.
    async fn try_acquire(
        &self,
        scope_key: &str,
        ttl: Duration,
    ) -> Result<LeaseOutcome, AutoAdsError>;

    /// Release a held lease. Must be called on every exit path of the
    /// guarded run; releasing an already-expired lease is a no-op.
    async fn release(&self, lease: &Lease) -> Result<(), AutoAdsError>;
}

// ---------------------------------------------------------------------------
// Redis implementation
// ---------------------------------------------------------------------------

pub struct RedisLeaseService {
    client: redis::Client,
}

impl RedisLeaseService {
    pub fn new(config: &RedisConfig) -> AutoAdsResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| AutoAdsError::Cache(format!("invalid redis url: {e}")))?;
        Ok(Self { client })
    }
}

// Delete only if the stored token is still ours.
const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

#[async_trait]
impl LeaseService for RedisLeaseService {
    async fn try_acquire(
        &self,
        scope_key: &str,
        ttl: Duration,
    ) -> Result<LeaseOutcome, AutoAdsError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AutoAdsError::Cache(format!("redis connection failed: {e}")))?;

        let token = Uuid::new_v4().to_string();
        let reply: Option<String> = redis::cmd("SET")
            .arg(scope_key)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| AutoAdsError::Cache(format!("lease SET failed: {e}")))?;

        match reply {
            Some(_) => {
                info!(scope_key, "lease acquired");
                metrics::counter!("lease.acquired").increment(1);
                Ok(LeaseOutcome::Held(Lease {
                    scope_key: scope_key.to_string(),
                    token,
                }))
            }
            None => {
                info!(scope_key, "lease already held, skipping");
                metrics::counter!("lease.contended").increment(1);
                Ok(LeaseOutcome::Contended)
            }
        }
    }

    async fn release(&self, lease: &Lease) -> Result<(), AutoAdsError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AutoAdsError::Cache(format!("redis connection failed: {e}")))?;

        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&lease.scope_key)
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AutoAdsError::Cache(format!("lease release failed: {e}")))?;

        debug!(scope_key = %lease.scope_key, deleted, "lease released");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Process-local lease table for tests and `--local` dry runs.
#[derive(Default)]
pub struct LocalLeaseService {
    held: DashMap<String, (String, i64)>,
}

impl LocalLeaseService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseService for LocalLeaseService {
    async fn try_acquire(
        &self,
        scope_key: &str,
        ttl: Duration,
    ) -> Result<LeaseOutcome, AutoAdsError> {
        let now = Utc::now().timestamp();
        let expires_at = now + ttl.as_secs() as i64;
        let token = Uuid::new_v4().to_string();

        // The entry guard holds the shard lock, making check-and-set atomic.
        match self.held.entry(scope_key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let (_, held_until) = occupied.get();
                if *held_until > now {
                    return Ok(LeaseOutcome::Contended);
                }
                occupied.insert((token.clone(), expires_at));
                Ok(LeaseOutcome::Held(Lease {
                    scope_key: scope_key.to_string(),
                    token,
                }))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert((token.clone(), expires_at));
                Ok(LeaseOutcome::Held(Lease {
                    scope_key: scope_key.to_string(),
                    token,
                }))
            }
        }
    }

    async fn release(&self, lease: &Lease) -> Result<(), AutoAdsError> {
        self.held
            .remove_if(&lease.scope_key, |_, (token, _)| *token == lease.token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_key_normalizes_narrowing() {
        assert_eq!(
            run_scope_key("123", "Summer Sale!"),
            "lock:onoff:123:summer-sale"
        );
        assert_eq!(run_scope_key("123", ""), "lock:onoff:123:");
    }

    #[tokio::test]
    async fn test_second_acquire_is_contended() {
        let service = LocalLeaseService::new();
        let first = service
            .try_acquire("lock:onoff:1:x", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(first.is_held());

        let second = service
            .try_acquire("lock:onoff:1:x", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!second.is_held());
    }

    #[tokio::test]
    async fn test_concurrent_acquire_exactly_one_held() {
        use std::sync::Arc;

        let service = Arc::new(LocalLeaseService::new());
        let a = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .try_acquire("lock:onoff:9:race", Duration::from_secs(60))
                    .await
                    .unwrap()
            })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .try_acquire("lock:onoff:9:race", Duration::from_secs(60))
                    .await
                    .unwrap()
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(
            a.is_held() as u8 + b.is_held() as u8,
            1,
            "exactly one contender may hold the lease"
        );
    }

    #[tokio::test]
    async fn test_release_then_reacquire() {
        let service = LocalLeaseService::new();
        let lease = match service
            .try_acquire("lock:onoff:2:y", Duration::from_secs(60))
            .await
            .unwrap()
        {
            LeaseOutcome::Held(lease) => lease,
            LeaseOutcome::Contended => panic!("first acquire must succeed"),
        };

        service.release(&lease).await.unwrap();
        assert!(service
            .try_acquire("lock:onoff:2:y", Duration::from_secs(60))
            .await
            .unwrap()
            .is_held());
    }

    #[tokio::test]
    async fn test_stale_release_does_not_free_new_holder() {
        let service = LocalLeaseService::new();
        let stale = Lease {
            scope_key: "lock:onoff:3:z".into(),
            token: "not-the-current-token".into(),
        };

        assert!(service
            .try_acquire("lock:onoff:3:z", Duration::from_secs(60))
            .await
            .unwrap()
            .is_held());

        // A crashed holder's late release must not evict the new holder.
        service.release(&stale).await.unwrap();
        assert!(!service
            .try_acquire("lock:onoff:3:z", Duration::from_secs(60))
            .await
            .unwrap()
            .is_held());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let service = LocalLeaseService::new();
        assert!(service
            .try_acquire("lock:onoff:4:w", Duration::from_secs(0))
            .await
            .unwrap()
            .is_held());

        // TTL of zero expires immediately; the next contender takes over.
        assert!(service
            .try_acquire("lock:onoff:4:w", Duration::from_secs(60))
            .await
            .unwrap()
            .is_held());
    }
}
