//! Integration tests for the distributed lock, run against the in-memory
//! store plus a deliberately-broken store for the fail-open path.

use async_trait::async_trait;
use medsync_server::lock::{
    DistributedLock, LockOptions, LockOutcome, LockStore, LockStoreError, MemoryLockStore,
};
use std::sync::Arc;
use std::time::Duration;

/// Simulates a lock backend that is completely unreachable.
struct UnreachableLockStore;

#[async_trait]
impl LockStore for UnreachableLockStore {
    async fn try_acquire(
        &self,
        _key: &str,
        _token: &str,
        _ttl: Duration,
    ) -> Result<bool, LockStoreError> {
        Err(LockStoreError("connection refused".into()))
    }

    async fn release_if_owner(&self, _key: &str, _token: &str) -> Result<bool, LockStoreError> {
        Err(LockStoreError("connection refused".into()))
    }

    async fn extend_if_owner(
        &self,
        _key: &str,
        _token: &str,
        _additional: Duration,
    ) -> Result<bool, LockStoreError> {
        Err(LockStoreError("connection refused".into()))
    }

    async fn holder(&self, _key: &str) -> Result<Option<String>, LockStoreError> {
        Err(LockStoreError("connection refused".into()))
    }
}

fn memory_lock() -> (DistributedLock, Arc<MemoryLockStore>) {
    let store = Arc::new(MemoryLockStore::new());
    (DistributedLock::new(store.clone()), store)
}

const NO_RETRY: LockOptions = LockOptions {
    retries: 0,
    retry_delay: Duration::from_millis(1),
};

#[tokio::test]
async fn concurrent_acquires_grant_exactly_one() {
    let (lock, _) = memory_lock();
    let ttl = Duration::from_secs(5);

    let (a, b) = tokio::join!(
        lock.acquire_with("report", ttl, NO_RETRY),
        lock.acquire_with("report", ttl, NO_RETRY),
    );

    assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
}

#[tokio::test]
async fn released_lock_can_be_reacquired() {
    let (lock, _) = memory_lock();
    let ttl = Duration::from_secs(5);

    let held = lock.acquire_with("report", ttl, NO_RETRY).await.unwrap();
    assert!(lock.acquire_with("report", ttl, NO_RETRY).await.is_none());

    held.release().await;
    assert!(lock.acquire_with("report", ttl, NO_RETRY).await.is_some());
}

#[tokio::test]
async fn retries_win_when_the_holder_releases() {
    let (lock, _) = memory_lock();
    let ttl = Duration::from_secs(5);

    let held = lock.acquire_with("report", ttl, NO_RETRY).await.unwrap();

    let contender = lock.acquire_with(
        "report",
        ttl,
        LockOptions {
            retries: 10,
            retry_delay: Duration::from_millis(10),
        },
    );
    let releaser = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        held.release().await;
    };

    let (won, ()) = tokio::join!(contender, releaser);
    assert!(won.is_some());
}

#[tokio::test]
async fn stale_handle_cannot_release_a_successor() {
    let (lock, store) = memory_lock();

    // X's lock expires before it gets around to releasing.
    let x = lock
        .acquire_with("report", Duration::from_millis(30), NO_RETRY)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Y takes over after expiry.
    let _y = lock
        .acquire_with("report", Duration::from_secs(5), NO_RETRY)
        .await
        .unwrap();
    let holder_before = store.holder("lock:report").await.unwrap();
    assert!(holder_before.is_some());

    // X's late release is a no-op; Y still holds the lock.
    x.release().await;
    assert_eq!(store.holder("lock:report").await.unwrap(), holder_before);
}

#[tokio::test]
async fn extend_keeps_the_lock_alive() {
    let (lock, store) = memory_lock();

    let held = lock
        .acquire_with("report", Duration::from_millis(80), NO_RETRY)
        .await
        .unwrap();
    assert!(held.extend(Duration::from_secs(5)).await);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(store.holder("lock:report").await.unwrap().is_some());
}

#[tokio::test]
async fn extend_refused_after_reclaim() {
    let (lock, _) = memory_lock();

    let x = lock
        .acquire_with("report", Duration::from_millis(30), NO_RETRY)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _y = lock
        .acquire_with("report", Duration::from_secs(5), NO_RETRY)
        .await
        .unwrap();

    assert!(!x.extend(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn unreachable_store_fails_open() {
    let lock = DistributedLock::new(Arc::new(UnreachableLockStore));

    // Acquisition is granted despite the backend being down, so scheduled
    // work keeps running during a lock outage.
    let held = lock
        .acquire_with("report", Duration::from_secs(5), NO_RETRY)
        .await;
    assert!(held.is_some());
    held.unwrap().release().await; // must not panic

    let outcome = lock
        .with_lock("report", Duration::from_secs(5), || async { 42 })
        .await;
    assert_eq!(outcome, LockOutcome::Completed(42));
}

#[tokio::test]
async fn with_lock_skips_while_held() {
    let (lock, _) = memory_lock();
    let ttl = Duration::from_secs(60);

    let held = lock.acquire_with("report", ttl, NO_RETRY).await.unwrap();

    let ran = std::sync::atomic::AtomicBool::new(false);
    let outcome = lock
        .with_lock("report", ttl, || async {
            ran.store(true, std::sync::atomic::Ordering::SeqCst);
        })
        .await;
    assert!(outcome.was_skipped());
    assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));

    held.release().await;
}

#[tokio::test]
async fn with_lock_releases_after_the_job() {
    let (lock, store) = memory_lock();
    let ttl = Duration::from_secs(60);

    let outcome = lock.with_lock("report", ttl, || async { "done" }).await;
    assert_eq!(outcome, LockOutcome::Completed("done"));
    assert!(store.holder("lock:report").await.unwrap().is_none());
}
