//! Distributed mutual exclusion for scheduled jobs.
//!
//! In a horizontally-scaled deployment every process instance fires the same
//! cron-style jobs. Each job tick wraps its critical section in a named lock
//! so only one instance runs it. Exclusivity is time-bounded by the TTL, not
//! indefinite: a crashed holder's key simply expires.
//!
//! Failing to acquire is a normal outcome (another instance is doing the
//! work), not an error. When the backing store itself is unreachable the
//! manager **fails open**: acquisition is treated as granted, trading strict
//! mutual exclusion for availability. A missed lock only risks duplicate job
//! execution, never data loss, and a locking outage must not take down the
//! scheduled-job system. This is a deliberate design choice.

mod memory;
mod redis;
mod store;

pub use self::memory::MemoryLockStore;
pub use self::redis::RedisLockStore;
pub use self::store::{LockStore, LockStoreError};

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Retry bounds for a single acquisition attempt.
#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// Additional attempts after the first one fails because the lock is held.
    pub retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay: Duration::from_millis(150),
        }
    }
}

/// Result of running a closure under a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome<T> {
    /// The lock was held (or failed open) and the closure ran.
    Completed(T),
    /// Another holder was active; the closure never ran.
    Skipped,
}

impl<T> LockOutcome<T> {
    pub fn was_skipped(&self) -> bool {
        matches!(self, LockOutcome::Skipped)
    }
}

/// Handle to the shared lock store; cheap to clone.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn LockStore>,
}

/// A held (or fail-open) acquisition. Release is owner-checked, so a handle
/// whose TTL already lapsed cannot clobber a successor's lock.
pub struct HeldLock {
    store: Arc<dyn LockStore>,
    key: String,
    token: String,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self { store }
    }

    /// Acquire `name` with default retry bounds.
    pub async fn acquire(&self, name: &str, ttl: Duration) -> Option<HeldLock> {
        self.acquire_with(name, ttl, LockOptions::default()).await
    }

    /// Acquire `name`, retrying a bounded number of times with a fixed delay.
    ///
    /// Returns `None` only when another holder stayed active through every
    /// attempt. Store failures fail open and return a handle anyway.
    pub async fn acquire_with(
        &self,
        name: &str,
        ttl: Duration,
        options: LockOptions,
    ) -> Option<HeldLock> {
        let key = lock_key(name);
        let token = Uuid::new_v4().to_string();

        for attempt in 0..=options.retries {
            match self.store.try_acquire(&key, &token, ttl).await {
                Ok(true) => {
                    tracing::debug!(lock = name, "acquired");
                    return Some(self.held(key, token));
                }
                Ok(false) => {
                    if attempt < options.retries {
                        tokio::time::sleep(options.retry_delay).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(lock = name, error = %e, "lock store unreachable, failing open");
                    return Some(self.held(key, token));
                }
            }
        }

        tracing::debug!(lock = name, "already held, skipping");
        None
    }

    /// Acquire, run `job`, always release. Skips `job` entirely when another
    /// holder is active.
    ///
    /// If `job` panics the release is not reached and the key lingers until
    /// its TTL expires; exclusivity is time-bounded either way, so a crashed
    /// holder delays the next tick rather than deadlocking it.
    pub async fn with_lock<F, Fut, T>(&self, name: &str, ttl: Duration, job: F) -> LockOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        match self.acquire(name, ttl).await {
            Some(held) => {
                let out = job().await;
                held.release().await;
                LockOutcome::Completed(out)
            }
            None => LockOutcome::Skipped,
        }
    }

    fn held(&self, key: String, token: String) -> HeldLock {
        HeldLock {
            store: Arc::clone(&self.store),
            key,
            token,
        }
    }
}

impl HeldLock {
    /// Push the expiry out by `additional`. Long-running jobs call this to
    /// avoid losing the lock mid-execution. Fails open on store errors.
    pub async fn extend(&self, additional: Duration) -> bool {
        match self
            .store
            .extend_if_owner(&self.key, &self.token, additional)
            .await
        {
            Ok(extended) => {
                if !extended {
                    tracing::warn!(lock = %self.key, "extend refused, lock was reclaimed");
                }
                extended
            }
            Err(e) => {
                tracing::warn!(lock = %self.key, error = %e, "lock store unreachable during extend, failing open");
                true
            }
        }
    }

    /// Release the lock. Only removes the key if this handle still owns it;
    /// an expired-and-reclaimed lock is left alone.
    pub async fn release(self) {
        match self.store.release_if_owner(&self.key, &self.token).await {
            Ok(true) => tracing::debug!(lock = %self.key, "released"),
            Ok(false) => tracing::debug!(lock = %self.key, "already expired or reclaimed"),
            Err(e) => tracing::warn!(lock = %self.key, error = %e, "lock store unreachable during release"),
        }
    }
}

fn lock_key(name: &str) -> String {
    format!("lock:{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_format() {
        assert_eq!(lock_key("nightly-backup"), "lock:nightly-backup");
    }

    #[test]
    fn outcome_skipped() {
        let outcome: LockOutcome<()> = LockOutcome::Skipped;
        assert!(outcome.was_skipped());
        assert!(!LockOutcome::Completed(()).was_skipped());
    }
}
