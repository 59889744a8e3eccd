//! Central-side replica records.

use crate::{ClinicId, CollectionName, DocumentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shadow copy of one clinic-owned document.
///
/// Keyed by `(collection, original_id, source_clinic)`. Only the owning
/// clinic's pushes may mutate a replica under normal operation; replicas are
/// never physically removed, deletes leave a tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replica {
    pub collection: CollectionName,
    /// Identifier assigned by the owning clinic, stable across re-syncs.
    pub original_id: DocumentId,
    /// Provenance marker: which clinic produced this record.
    pub source_clinic: ClinicId,
    /// Opaque domain payload mirrored verbatim.
    pub payload: serde_json::Value,
    /// Server-assigned time of last replication; the pull cursor filters on
    /// this, so it must never move backwards for a given replica.
    pub synced_at: DateTime<Utc>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Replica {
    /// Create a live replica from an incoming change.
    pub fn new(
        collection: impl Into<CollectionName>,
        original_id: impl Into<DocumentId>,
        source_clinic: impl Into<ClinicId>,
        payload: serde_json::Value,
        synced_at: DateTime<Utc>,
    ) -> Self {
        Self {
            collection: collection.into(),
            original_id: original_id.into(),
            source_clinic: source_clinic.into(),
            payload,
            synced_at,
            deleted: false,
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Turn this replica into a tombstone. `deleted_at` is the client-side
    /// event time; `synced_at` advances to the server-side replication time.
    pub fn tombstone(&mut self, deleted_at: DateTime<Utc>, synced_at: DateTime<Utc>) {
        self.deleted = true;
        self.deleted_at = Some(deleted_at);
        self.synced_at = synced_at;
    }
}
