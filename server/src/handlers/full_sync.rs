//! Full-sync handler - bulk bootstrap of one collection.
//!
//! Bypasses the incremental cursors and upserts every record unconditionally.
//! Intended for the initial upload of a clinic's history, not routine
//! operation; conflicts are not detected here.

use chrono::Utc;
use medsync_engine::{
    is_synced_collection, ClinicRegistration, Error as EngineError, Replica,
};
use serde::{Deserialize, Serialize};

use crate::db::{ClinicStore, ReplicaStore, SyncCursor};
use crate::error::{AppError, Result};

/// Request body for a full sync of one collection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSyncRequest {
    pub collection: String,
    pub data: Vec<serde_json::Value>,
}

/// Response for a full sync.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSyncResponse {
    /// Records upserted.
    pub synced: usize,
    /// Records skipped for lacking an identifier.
    pub skipped: usize,
}

/// Process a full-sync request from an authenticated clinic.
pub async fn handle_full_sync(
    replicas: &dyn ReplicaStore,
    clinics: &dyn ClinicStore,
    caller: &ClinicRegistration,
    request: FullSyncRequest,
) -> Result<FullSyncResponse> {
    if !caller.sync_enabled {
        return Err(AppError::SyncDisabled);
    }
    if !is_synced_collection(&request.collection) {
        return Err(EngineError::UnknownCollection(request.collection).into());
    }
    if !caller.can_sync(&request.collection) {
        return Err(EngineError::CollectionNotAllowed(request.collection).into());
    }

    let now = Utc::now();
    let mut synced = 0;
    let mut skipped = 0;

    for document in request.data {
        let Some(original_id) = document_id(&document) else {
            skipped += 1;
            continue;
        };

        let replica = Replica::new(
            request.collection.clone(),
            original_id,
            caller.clinic_id.clone(),
            document,
            now,
        );
        replicas.upsert(&replica).await?;
        synced += 1;
    }

    clinics
        .advance_cursor(&caller.clinic_id, SyncCursor::Full, now)
        .await?;

    tracing::info!(
        clinic = %caller.clinic_id,
        collection = %request.collection,
        synced,
        skipped,
        "full sync processed"
    );

    Ok(FullSyncResponse { synced, skipped })
}

/// The clinic-assigned identifier of a bulk record, from `_id` or `id`.
fn document_id(document: &serde_json::Value) -> Option<String> {
    document
        .get("_id")
        .or_else(|| document.get("id"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_id_prefers_underscore_id() {
        assert_eq!(
            document_id(&json!({"_id": "a", "id": "b"})),
            Some("a".to_string())
        );
        assert_eq!(document_id(&json!({"id": "b"})), Some("b".to_string()));
        assert_eq!(document_id(&json!({"name": "no id"})), None);
        assert_eq!(document_id(&json!({"_id": " "})), None);
        assert_eq!(document_id(&json!({"_id": 42})), None); // non-string ids are skipped
    }
}
