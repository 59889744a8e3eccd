//! Push handler - applies a batch of changes from one clinic node.
//!
//! Each change is processed independently: a failure is recorded in the
//! `failed` bucket and never aborts its siblings, because each replica
//! upsert is an independent atomic write and partial-batch failure is an
//! expected outcome, not an exceptional one.

use chrono::Utc;
use medsync_engine::{
    is_synced_collection, signals_for, ChangeOperation, ClinicRegistration, ConflictType,
    Error as EngineError, Replica, SyncChange,
};
use serde::{Deserialize, Serialize};

use crate::db::{ClinicStore, ReplicaStore, SyncCursor};
use crate::error::{AppError, Result};

/// Request body for push sync.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// Changes to apply, in client order.
    pub changes: Vec<SyncChange>,
}

/// Response for push sync. Every change lands in exactly one bucket.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    /// Sync IDs applied (or idempotently re-applied).
    pub synced: Vec<String>,
    /// Changes parked for manual adjudication. Not failures: clients must
    /// not blindly retry these.
    pub conflicts: Vec<ConflictEntry>,
    /// Changes that hit a per-change error; the client re-submits these on
    /// its next push cycle.
    pub failed: Vec<FailedChange>,
}

/// A change parked because another clinic appears to describe the same
/// real-world entity. Both versions are returned for manual merge; the
/// authoritative replica is left untouched.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub sync_id: String,
    pub document_id: String,
    pub collection: String,
    pub local_version: serde_json::Value,
    pub central_version: serde_json::Value,
    pub conflict_type: ConflictType,
}

/// A change that failed with an isolated error.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedChange {
    pub sync_id: String,
    pub error: String,
}

/// Outcome of one change.
enum Applied {
    Synced,
    Conflict(ConflictEntry),
}

/// Process a push request from an authenticated clinic.
pub async fn handle_push(
    replicas: &dyn ReplicaStore,
    clinics: &dyn ClinicStore,
    caller: &ClinicRegistration,
    request: PushRequest,
) -> Result<PushResponse> {
    if !caller.sync_enabled {
        return Err(AppError::SyncDisabled);
    }

    let mut synced = Vec::new();
    let mut conflicts = Vec::new();
    let mut failed = Vec::new();

    for change in &request.changes {
        match apply_change(replicas, caller, change).await {
            Ok(Applied::Synced) => synced.push(change.sync_id.clone()),
            Ok(Applied::Conflict(entry)) => conflicts.push(entry),
            Err(e) => {
                tracing::warn!(
                    clinic = %caller.clinic_id,
                    sync_id = %change.sync_id,
                    error = %e,
                    "change failed"
                );
                failed.push(FailedChange {
                    sync_id: change.sync_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    clinics
        .advance_cursor(&caller.clinic_id, SyncCursor::Push, Utc::now())
        .await?;

    tracing::info!(
        clinic = %caller.clinic_id,
        synced = synced.len(),
        conflicts = conflicts.len(),
        failed = failed.len(),
        "push processed"
    );

    Ok(PushResponse {
        synced,
        conflicts,
        failed,
    })
}

async fn apply_change(
    replicas: &dyn ReplicaStore,
    caller: &ClinicRegistration,
    change: &SyncChange,
) -> Result<Applied> {
    change.validate()?;

    if !is_synced_collection(&change.collection) {
        return Err(EngineError::UnknownCollection(change.collection.clone()).into());
    }
    if !caller.can_sync(&change.collection) {
        return Err(EngineError::CollectionNotAllowed(change.collection.clone()).into());
    }

    let now = Utc::now();

    match change.operation {
        ChangeOperation::Delete => {
            replicas
                .tombstone(
                    &change.collection,
                    &change.document_id,
                    &caller.clinic_id,
                    change.changed_at,
                    now,
                )
                .await?;
            Ok(Applied::Synced)
        }
        ChangeOperation::Create | ChangeOperation::Update => {
            // A foreign clinic already describing this entity parks the
            // change; the existing replica stays authoritative until a human
            // adjudicates.
            if let Some(signals) = signals_for(&change.collection, &change.data) {
                if let Some(existing) = replicas
                    .find_identity_match(&change.collection, &signals, &caller.clinic_id)
                    .await?
                {
                    return Ok(Applied::Conflict(ConflictEntry {
                        sync_id: change.sync_id.clone(),
                        document_id: change.document_id.clone(),
                        collection: change.collection.clone(),
                        local_version: change.data.clone(),
                        central_version: existing.payload,
                        conflict_type: ConflictType::CrossClinicDuplicate,
                    }));
                }
            }

            // Upsert by natural key makes re-sent changes idempotent.
            let replica = Replica::new(
                change.collection.clone(),
                change.document_id.clone(),
                caller.clinic_id.clone(),
                change.data.clone(),
                now,
            );
            replicas.upsert(&replica).await?;
            Ok(Applied::Synced)
        }
    }
}
