//! Storage seam for the distributed lock.

use async_trait::async_trait;
use std::time::Duration;

/// Infrastructure-level failure talking to the lock backend.
///
/// Never propagated to job code: the lock manager converts it into fail-open
/// acquisition.
#[derive(Debug, thiserror::Error)]
#[error("lock store unavailable: {0}")]
pub struct LockStoreError(pub String);

/// A shared key-value store with expiring keys.
///
/// Existence of a key *is* the lock state; there is no persistent record.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomic set-if-absent with expiry. Returns `true` if the key was set.
    async fn try_acquire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError>;

    /// Atomic compare-and-delete: remove the key only if its value still
    /// equals `token`. Returns `true` if the key was removed.
    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool, LockStoreError>;

    /// Atomic compare-and-extend: push the expiry out by `additional` only if
    /// the key's value still equals `token`.
    async fn extend_if_owner(
        &self,
        key: &str,
        token: &str,
        additional: Duration,
    ) -> Result<bool, LockStoreError>;

    /// Current holder token, if the key exists and has not expired.
    async fn holder(&self, key: &str) -> Result<Option<String>, LockStoreError>;
}
