//! Clinic node registrations and their lifecycle rules.

use crate::error::{Error, Result};
use crate::{ClinicId, CollectionName};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A clinic counts as online if it authenticated within this window.
pub const ONLINE_WINDOW_SECS: i64 = 5 * 60;

/// Lifecycle status of a clinic registration.
///
/// Registrations are never hard-deleted, only status-transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicStatus {
    PendingApproval,
    Active,
    Suspended,
    Inactive,
}

impl ClinicStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClinicStatus::PendingApproval => "pending_approval",
            ClinicStatus::Active => "active",
            ClinicStatus::Suspended => "suspended",
            ClinicStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ClinicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClinicStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending_approval" => Ok(ClinicStatus::PendingApproval),
            "active" => Ok(ClinicStatus::Active),
            "suspended" => Ok(ClinicStatus::Suspended),
            "inactive" => Ok(ClinicStatus::Inactive),
            other => Err(Error::InvalidChange(format!(
                "unknown clinic status: {other}"
            ))),
        }
    }
}

/// Normalize a clinic identifier: trimmed and uppercased, immutable after
/// registration.
pub fn normalize_clinic_id(raw: &str) -> ClinicId {
    raw.trim().to_uppercase()
}

/// One registered clinic node.
///
/// The registration is the only durable artifact the sync subsystem owns
/// besides the replica collections themselves. The sync secret is stored
/// only as a hash; this struct never carries plaintext credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicRegistration {
    pub clinic_id: ClinicId,
    pub name: String,
    pub short_name: String,
    /// PHC-formatted hash of the long-lived sync secret.
    pub secret_hash: String,
    /// Auto-generated key for auxiliary (non-sync) operations.
    pub api_key: String,
    pub status: ClinicStatus,
    pub sync_enabled: bool,
    /// Collections this clinic is permitted to synchronize.
    pub allowed_collections: Vec<CollectionName>,
    pub sync_interval_minutes: i32,
    pub last_push_at: Option<DateTime<Utc>>,
    pub last_pull_at: Option<DateTime<Utc>>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub last_ip: Option<String>,
    pub last_agent: Option<String>,
    pub suspension_reason: Option<String>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClinicRegistration {
    /// Create a fresh registration in `pending_approval`.
    pub fn new(
        clinic_id: impl AsRef<str>,
        name: impl Into<String>,
        short_name: impl Into<String>,
        secret_hash: impl Into<String>,
        api_key: impl Into<String>,
        allowed_collections: Vec<CollectionName>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            clinic_id: normalize_clinic_id(clinic_id.as_ref()),
            name: name.into(),
            short_name: short_name.into(),
            secret_hash: secret_hash.into(),
            api_key: api_key.into(),
            status: ClinicStatus::PendingApproval,
            sync_enabled: true,
            allowed_collections,
            sync_interval_minutes: 15,
            last_push_at: None,
            last_pull_at: None,
            last_sync_at: None,
            last_seen_at: None,
            last_ip: None,
            last_agent: None,
            suspension_reason: None,
            approved_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True iff sync is enabled and the collection is in the allow-list.
    pub fn can_sync(&self, collection: &str) -> bool {
        self.sync_enabled && self.allowed_collections.iter().any(|c| c == collection)
    }

    /// Derived liveness: seen within the online window. Never stored.
    pub fn is_online(&self, now: DateTime<Utc>) -> bool {
        match self.last_seen_at {
            Some(seen) => now - seen < Duration::seconds(ONLINE_WINDOW_SECS),
            None => false,
        }
    }

    /// Transition to `active`, recording who approved.
    pub fn approve(&mut self, approver: &str, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            ClinicStatus::PendingApproval | ClinicStatus::Suspended | ClinicStatus::Inactive => {
                self.status = ClinicStatus::Active;
                self.approved_by = Some(approver.to_string());
                self.suspension_reason = None;
                self.updated_at = now;
                Ok(())
            }
            from => Err(Error::InvalidStatusTransition {
                from,
                to: ClinicStatus::Active,
            }),
        }
    }

    /// Transition to `suspended` with a reason.
    pub fn suspend(&mut self, reason: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status == ClinicStatus::Suspended {
            return Err(Error::InvalidStatusTransition {
                from: ClinicStatus::Suspended,
                to: ClinicStatus::Suspended,
            });
        }
        self.status = ClinicStatus::Suspended;
        self.suspension_reason = Some(reason.to_string());
        self.updated_at = now;
        Ok(())
    }
}
