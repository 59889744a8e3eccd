//! Pull handler - serves foreign-clinic changes since a cursor.
//!
//! Nothing is ever removed from the replica tables, so a pull with an old
//! cursor re-receives the same changes; receivers must be idempotent on
//! `(sourceClinic, collection, documentId)`.

use chrono::{DateTime, Utc};
use medsync_engine::{
    is_synced_collection, ChangeOperation, ClinicRegistration, Error as EngineError, PullChange,
    Replica,
};
use serde::{Deserialize, Serialize};

use crate::db::{ClinicStore, ReplicaStore, SyncCursor};
use crate::error::{AppError, Result};

/// Query parameters for pull sync.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullQuery {
    /// Cursor from the previous pull (ISO timestamp). Defaults to epoch.
    pub since: Option<DateTime<Utc>>,
    /// Comma-separated collection filter. Defaults to everything the clinic
    /// is permitted to sync.
    pub collections: Option<String>,
}

/// Response for pull sync.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub changes: Vec<PullChange>,
}

/// Process a pull request from an authenticated clinic.
pub async fn handle_pull(
    replicas: &dyn ReplicaStore,
    clinics: &dyn ClinicStore,
    caller: &ClinicRegistration,
    query: PullQuery,
) -> Result<PullResponse> {
    if !caller.sync_enabled {
        return Err(AppError::SyncDisabled);
    }

    let collections = requested_collections(caller, query.collections.as_deref())?;
    let since = query.since.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let found = replicas
        .changes_since(&collections, &caller.clinic_id, since)
        .await?;

    let changes: Vec<PullChange> = found.into_iter().map(to_pull_change).collect();

    clinics
        .advance_cursor(&caller.clinic_id, SyncCursor::Pull, Utc::now())
        .await?;

    tracing::info!(
        clinic = %caller.clinic_id,
        since = %since,
        changes = changes.len(),
        "pull served"
    );

    Ok(PullResponse { changes })
}

/// Resolve the collection filter against the caller's allow-list.
///
/// Explicitly requesting a collection the clinic may not sync is a
/// request-level authorization failure, unlike push where the bad change is
/// isolated into the `failed` bucket.
fn requested_collections(
    caller: &ClinicRegistration,
    filter: Option<&str>,
) -> Result<Vec<String>> {
    match filter {
        Some(csv) => {
            let mut out = Vec::new();
            for name in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !is_synced_collection(name) {
                    return Err(EngineError::UnknownCollection(name.to_string()).into());
                }
                if !caller.can_sync(name) {
                    return Err(EngineError::CollectionNotAllowed(name.to_string()).into());
                }
                out.push(name.to_string());
            }
            if out.is_empty() {
                return Err(AppError::BadRequest("empty collections filter".into()));
            }
            Ok(out)
        }
        None => Ok(caller
            .allowed_collections
            .iter()
            .filter(|c| is_synced_collection(c))
            .cloned()
            .collect()),
    }
}

fn to_pull_change(replica: Replica) -> PullChange {
    let operation = if replica.deleted {
        ChangeOperation::Delete
    } else {
        ChangeOperation::Update
    };

    PullChange {
        collection: replica.collection,
        operation,
        document_id: replica.original_id,
        source_clinic: replica.source_clinic,
        data: replica.payload,
        timestamp: replica.synced_at,
    }
}
