//! In-process lock store.
//!
//! The fallback when no Redis URL is configured: correct within a single
//! process, useless across instances. Also the backend the lock tests run
//! against.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::store::{LockStore, LockStoreError};

struct Entry {
    token: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Lock store held in a process-local map with lazy expiry.
#[derive(Default)]
pub struct MemoryLockStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Ok(false),
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        token: token.to_string(),
                        expires_at: now + ttl,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool, LockStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) && entry.token == token => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn extend_if_owner(
        &self,
        key: &str,
        token: &str,
        additional: Duration,
    ) -> Result<bool, LockStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) && entry.token == token => {
                entry.expires_at += additional;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn holder(&self, key: &str) -> Result<Option<String>, LockStoreError> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap();

        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.token.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_then_blocked() {
        let store = MemoryLockStore::new();
        assert!(store
            .try_acquire("lock:x", "t1", Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!store
            .try_acquire("lock:x", "t2", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn expired_entry_can_be_reacquired() {
        let store = MemoryLockStore::new();
        assert!(store
            .try_acquire("lock:x", "t1", Duration::from_millis(10))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store
            .try_acquire("lock:x", "t2", Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(store.holder("lock:x").await.unwrap().as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn release_requires_ownership() {
        let store = MemoryLockStore::new();
        store
            .try_acquire("lock:x", "t1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(!store.release_if_owner("lock:x", "t2").await.unwrap());
        assert!(store.holder("lock:x").await.unwrap().is_some());

        assert!(store.release_if_owner("lock:x", "t1").await.unwrap());
        assert!(store.holder("lock:x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn extend_requires_ownership() {
        let store = MemoryLockStore::new();
        store
            .try_acquire("lock:x", "t1", Duration::from_millis(50))
            .await
            .unwrap();

        assert!(!store
            .extend_if_owner("lock:x", "t2", Duration::from_secs(60))
            .await
            .unwrap());
        assert!(store
            .extend_if_owner("lock:x", "t1", Duration::from_secs(60))
            .await
            .unwrap());

        tokio::time::sleep(Duration::from_millis(80)).await;
        // Still held thanks to the extension.
        assert_eq!(store.holder("lock:x").await.unwrap().as_deref(), Some("t1"));
    }
}
