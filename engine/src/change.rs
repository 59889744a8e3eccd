//! Wire-level change types exchanged between clinic nodes and the hub.

use crate::error::{Error, Result};
use crate::{ClinicId, CollectionName, DocumentId, SyncId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of mutation a change carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

/// A single change submitted by a clinic node during a push.
///
/// `sync_id` is assigned by the client and is the key used for idempotency
/// and per-item outcome reporting. `changed_at` is client-side event time,
/// distinct from the server-assigned replication timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncChange {
    pub sync_id: SyncId,
    pub collection: CollectionName,
    pub operation: ChangeOperation,
    pub document_id: DocumentId,
    /// Opaque, collection-specific document mirrored verbatim.
    #[serde(default)]
    pub data: serde_json::Value,
    pub changed_at: DateTime<Utc>,
}

impl SyncChange {
    /// Validate the structural parts of a change before applying it.
    pub fn validate(&self) -> Result<()> {
        if self.sync_id.trim().is_empty() {
            return Err(Error::InvalidChange("empty syncId".into()));
        }
        if self.document_id.trim().is_empty() {
            return Err(Error::MissingDocumentId);
        }
        match self.operation {
            ChangeOperation::Create | ChangeOperation::Update => {
                if !self.data.is_object() {
                    return Err(Error::InvalidChange(
                        "create/update requires an object payload".into(),
                    ));
                }
                Ok(())
            }
            ChangeOperation::Delete => Ok(()),
        }
    }
}

/// A change served to a clinic node during a pull.
///
/// Projected from a replica: deleted replicas come back as `delete`,
/// everything else as `update` (receivers upsert, so create/update are
/// indistinguishable on the way down). `timestamp` is the server-side
/// replication time and is what the client's next `since` cursor is based on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullChange {
    pub collection: CollectionName,
    pub operation: ChangeOperation,
    pub document_id: DocumentId,
    pub source_clinic: ClinicId,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
