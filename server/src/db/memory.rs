//! In-memory store implementations.
//!
//! Used by the integration tests and handy for local experiments; the
//! production path always runs on the Postgres stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medsync_engine::{signals_for, ClinicRegistration, ClinicStatus, IdentitySignals, Replica};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ClinicStore, ReplicaStore, StoreError, SyncCursor};

/// Clinic registry held in a process-local map.
#[derive(Default)]
pub struct MemoryClinicStore {
    clinics: Mutex<HashMap<String, ClinicRegistration>>,
}

impl MemoryClinicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registration directly, bypassing the registration flow.
    pub fn seed(&self, registration: ClinicRegistration) {
        self.clinics
            .lock()
            .unwrap()
            .insert(registration.clinic_id.clone(), registration);
    }
}

#[async_trait]
impl ClinicStore for MemoryClinicStore {
    async fn insert(&self, registration: &ClinicRegistration) -> Result<(), StoreError> {
        let mut clinics = self.clinics.lock().unwrap();
        if clinics.contains_key(&registration.clinic_id) {
            return Err(StoreError::Duplicate);
        }
        clinics.insert(registration.clinic_id.clone(), registration.clone());
        Ok(())
    }

    async fn find(&self, clinic_id: &str) -> Result<Option<ClinicRegistration>, StoreError> {
        Ok(self.clinics.lock().unwrap().get(clinic_id).cloned())
    }

    async fn find_active(&self, clinic_id: &str) -> Result<Option<ClinicRegistration>, StoreError> {
        Ok(self
            .clinics
            .lock()
            .unwrap()
            .get(clinic_id)
            .filter(|c| c.status == ClinicStatus::Active)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<ClinicRegistration>, StoreError> {
        let mut all: Vec<_> = self.clinics.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.clinic_id.cmp(&b.clinic_id));
        Ok(all)
    }

    async fn update_status(
        &self,
        clinic_id: &str,
        status: ClinicStatus,
        approved_by: Option<&str>,
        suspension_reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(clinic) = self.clinics.lock().unwrap().get_mut(clinic_id) {
            clinic.status = status;
            if let Some(approver) = approved_by {
                clinic.approved_by = Some(approver.to_string());
            }
            clinic.suspension_reason = suspension_reason.map(str::to_string);
            clinic.updated_at = now;
        }
        Ok(())
    }

    async fn update_secret(
        &self,
        clinic_id: &str,
        secret_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(clinic) = self.clinics.lock().unwrap().get_mut(clinic_id) {
            clinic.secret_hash = secret_hash.to_string();
            clinic.updated_at = now;
        }
        Ok(())
    }

    async fn record_heartbeat(
        &self,
        clinic_id: &str,
        now: DateTime<Utc>,
        ip: Option<String>,
        agent: Option<String>,
    ) -> Result<(), StoreError> {
        if let Some(clinic) = self.clinics.lock().unwrap().get_mut(clinic_id) {
            clinic.last_seen_at = Some(now);
            if ip.is_some() {
                clinic.last_ip = ip;
            }
            if agent.is_some() {
                clinic.last_agent = agent;
            }
        }
        Ok(())
    }

    async fn advance_cursor(
        &self,
        clinic_id: &str,
        cursor: SyncCursor,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(clinic) = self.clinics.lock().unwrap().get_mut(clinic_id) {
            match cursor {
                SyncCursor::Push => clinic.last_push_at = Some(now),
                SyncCursor::Pull => clinic.last_pull_at = Some(now),
                SyncCursor::Full => {}
            }
            clinic.last_sync_at = Some(now);
        }
        Ok(())
    }
}

type ReplicaKey = (String, String, String);

/// Replica storage held in a process-local map.
#[derive(Default)]
pub struct MemoryReplicaStore {
    replicas: Mutex<HashMap<ReplicaKey, Replica>>,
}

impl MemoryReplicaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.replicas.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(collection: &str, original_id: &str, source_clinic: &str) -> ReplicaKey {
    (
        collection.to_string(),
        original_id.to_string(),
        source_clinic.to_string(),
    )
}

#[async_trait]
impl ReplicaStore for MemoryReplicaStore {
    async fn get(
        &self,
        collection: &str,
        original_id: &str,
        source_clinic: &str,
    ) -> Result<Option<Replica>, StoreError> {
        Ok(self
            .replicas
            .lock()
            .unwrap()
            .get(&key(collection, original_id, source_clinic))
            .cloned())
    }

    async fn find_identity_match(
        &self,
        collection: &str,
        signals: &IdentitySignals,
        exclude_clinic: &str,
    ) -> Result<Option<Replica>, StoreError> {
        if signals.is_empty() {
            return Ok(None);
        }

        let replicas = self.replicas.lock().unwrap();
        let found = replicas
            .values()
            .filter(|r| {
                r.collection == collection && r.source_clinic != exclude_clinic && r.is_active()
            })
            .find(|r| {
                signals_for(&r.collection, &r.payload)
                    .map(|candidate| signals.matches(&candidate))
                    .unwrap_or(false)
            })
            .cloned();

        Ok(found)
    }

    async fn upsert(&self, replica: &Replica) -> Result<(), StoreError> {
        self.replicas.lock().unwrap().insert(
            key(
                &replica.collection,
                &replica.original_id,
                &replica.source_clinic,
            ),
            replica.clone(),
        );
        Ok(())
    }

    async fn tombstone(
        &self,
        collection: &str,
        original_id: &str,
        source_clinic: &str,
        deleted_at: DateTime<Utc>,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(replica) = self
            .replicas
            .lock()
            .unwrap()
            .get_mut(&key(collection, original_id, source_clinic))
        {
            if replica.is_active() {
                replica.tombstone(deleted_at, synced_at);
            }
        }
        Ok(())
    }

    async fn changes_since(
        &self,
        collections: &[String],
        exclude_clinic: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Replica>, StoreError> {
        let replicas = self.replicas.lock().unwrap();
        let mut out: Vec<_> = replicas
            .values()
            .filter(|r| {
                collections.contains(&r.collection)
                    && r.source_clinic != exclude_clinic
                    && r.synced_at > since
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.synced_at
                .cmp(&b.synced_at)
                .then_with(|| a.original_id.cmp(&b.original_id))
        });
        Ok(out)
    }
}
