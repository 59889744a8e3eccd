//! Persistence layer: clinic registry and replica storage.
//!
//! The store traits are the seams handlers depend on; they are injected
//! through [`crate::AppState`] rather than reached through globals, so tests
//! can substitute the in-memory implementations.

mod clinics;
pub mod memory;
mod pool;
mod replicas;

pub use clinics::PgClinicStore;
pub use pool::{create_pool, run_migrations, Pool};
pub use replicas::PgReplicaStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medsync_engine::{ClinicRegistration, ClinicStatus, IdentitySignals, Replica};

/// Storage-level errors, shared by the Postgres and in-memory stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate key")]
    Duplicate,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Which registry cursor an exchange advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCursor {
    /// `lastPushAt` + `lastSyncAt`
    Push,
    /// `lastPullAt` + `lastSyncAt`
    Pull,
    /// `lastSyncAt` only (full-sync bootstrap)
    Full,
}

/// Durable clinic registrations. Registrations are never deleted, only
/// status-transitioned.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    /// Insert a new registration. Fails with [`StoreError::Duplicate`] if the
    /// clinic id is already taken.
    async fn insert(&self, registration: &ClinicRegistration) -> Result<(), StoreError>;

    /// Fetch a registration regardless of status.
    async fn find(&self, clinic_id: &str) -> Result<Option<ClinicRegistration>, StoreError>;

    /// Fetch only an `active` registration. Callers must not learn whether a
    /// miss was an unknown clinic or a non-active one.
    async fn find_active(&self, clinic_id: &str) -> Result<Option<ClinicRegistration>, StoreError>;

    async fn list(&self) -> Result<Vec<ClinicRegistration>, StoreError>;

    /// Persist a status transition already validated by the domain rules.
    async fn update_status(
        &self,
        clinic_id: &str,
        status: ClinicStatus,
        approved_by: Option<&str>,
        suspension_reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Replace the stored sync secret hash.
    async fn update_secret(
        &self,
        clinic_id: &str,
        secret_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Record an authenticated contact (heartbeat).
    async fn record_heartbeat(
        &self,
        clinic_id: &str,
        now: DateTime<Utc>,
        ip: Option<String>,
        agent: Option<String>,
    ) -> Result<(), StoreError>;

    /// Advance a sync cursor to `now`. Last-write-wins under concurrent
    /// pushes from the same clinic; see DESIGN.md.
    async fn advance_cursor(
        &self,
        clinic_id: &str,
        cursor: SyncCursor,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Per-collection replica shadow storage on the hub.
#[async_trait]
pub trait ReplicaStore: Send + Sync {
    /// Fetch the caller-owned replica, tombstoned or not.
    async fn get(
        &self,
        collection: &str,
        original_id: &str,
        source_clinic: &str,
    ) -> Result<Option<Replica>, StoreError>;

    /// Find a live replica from any *other* clinic whose identity signals
    /// match. Used by conflict detection; read-only.
    async fn find_identity_match(
        &self,
        collection: &str,
        signals: &IdentitySignals,
        exclude_clinic: &str,
    ) -> Result<Option<Replica>, StoreError>;

    /// Insert or replace the replica keyed by
    /// `(collection, original_id, source_clinic)`.
    async fn upsert(&self, replica: &Replica) -> Result<(), StoreError>;

    /// Tombstone the caller-owned replica. A no-op when the replica does not
    /// exist or is already tombstoned (idempotent deletes).
    async fn tombstone(
        &self,
        collection: &str,
        original_id: &str,
        source_clinic: &str,
        deleted_at: DateTime<Utc>,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Replicas from other clinics replicated after `since`, oldest first.
    /// Includes tombstones so receivers can propagate deletes.
    async fn changes_since(
        &self,
        collections: &[String],
        exclude_clinic: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Replica>, StoreError>;
}
