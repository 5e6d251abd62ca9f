use crate::config::BatchConfig;
use crate::domain::ports::{EntityKind, EntityLocker, LockToken};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug)]
struct Lease {
    token: u64,
    expires_at: Instant,
}

/// Leased in-process entity lock.
///
/// Each grant carries an expiry; an acquirer finding an expired lease steals
/// it, so a holder that crashed mid-operation cannot block its key forever.
/// Acquisition polls up to `max_wait` and then reports failure instead of
/// waiting indefinitely.
pub struct LeaseLocker {
    leases: Mutex<HashMap<(EntityKind, u64), Lease>>,
    next_token: AtomicU64,
    ttl: Duration,
    max_wait: Duration,
}

impl LeaseLocker {
    pub fn new(ttl: Duration, max_wait: Duration) -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            ttl,
            max_wait,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(config.lock_ttl(), config.lock_wait())
    }

    fn try_acquire(&self, kind: EntityKind, id: u64) -> Option<LockToken> {
        let mut leases = self.leases.lock();
        let now = Instant::now();
        if let Some(lease) = leases.get(&(kind, id)) {
            if lease.expires_at > now {
                return None;
            }
            warn!(?kind, id, "stealing expired lease");
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        leases.insert(
            (kind, id),
            Lease {
                token,
                expires_at: now + self.ttl,
            },
        );
        Some(LockToken(token))
    }
}

#[async_trait]
impl EntityLocker for LeaseLocker {
    async fn acquire(&self, kind: EntityKind, id: u64) -> Result<LockToken> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            if let Some(token) = self.try_acquire(kind, id) {
                return Ok(token);
            }
            if Instant::now() >= deadline {
                return Err(Error::LockUnavailable {
                    entity: format!("{kind:?}:{id}"),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn release(&self, kind: EntityKind, id: u64, token: LockToken) {
        let mut leases = self.leases.lock();
        if let Some(lease) = leases.get(&(kind, id))
            && lease.token == token.0
        {
            leases.remove(&(kind, id));
        }
        // A mismatched token means the lease expired and was stolen; the new
        // holder owns the key now.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locker() -> LeaseLocker {
        LeaseLocker::new(Duration::from_secs(30), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn acquire_is_exclusive_until_release() {
        let locker = locker();
        let token = locker.acquire(EntityKind::Account, 1).await.unwrap();

        let second = locker.acquire(EntityKind::Account, 1).await;
        assert!(matches!(second, Err(Error::LockUnavailable { .. })));

        locker.release(EntityKind::Account, 1, token).await;
        locker.acquire(EntityKind::Account, 1).await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locker = locker();
        locker.acquire(EntityKind::Account, 1).await.unwrap();
        locker.acquire(EntityKind::Account, 2).await.unwrap();
        locker.acquire(EntityKind::Booking, 1).await.unwrap();
    }

    #[tokio::test]
    async fn expired_lease_is_stolen() {
        let locker = LeaseLocker::new(Duration::from_millis(50), Duration::from_millis(20));
        let stale = locker.acquire(EntityKind::Account, 1).await.unwrap();

        // Past the TTL the key must be acquirable again.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let fresh = locker.acquire(EntityKind::Account, 1).await.unwrap();
        assert_ne!(stale, fresh);

        // The stale holder's release is a no-op; the new lease survives it.
        locker.release(EntityKind::Account, 1, stale).await;
        let contended = locker.acquire(EntityKind::Account, 1).await;
        assert!(contended.is_err());
        locker.release(EntityKind::Account, 1, fresh).await;
    }
}
