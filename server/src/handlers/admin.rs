//! Admin handlers - clinic registry management.
//!
//! All operations here require the master operator credential; none are ever
//! exposed to clinic-level credentials. Registrations are only ever
//! status-transitioned, never deleted.

use chrono::Utc;
use medsync_engine::{
    is_synced_collection, normalize_clinic_id, ClinicRegistration, ClinicStatus,
    Error as EngineError,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::hash_secret;
use crate::db::ClinicStore;
use crate::error::{AppError, Result};

/// Request body for registering a new clinic node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClinicRequest {
    pub clinic_id: String,
    pub name: String,
    pub short_name: String,
    /// Raw long-lived sync secret; stored only as a hash.
    pub sync_secret: String,
    pub allowed_collections: Vec<String>,
    pub sync_interval_minutes: Option<i32>,
}

/// Registration response; the API key is only ever returned here.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClinicResponse {
    pub clinic: ClinicView,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveClinicRequest {
    pub approver: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendClinicRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSecretRequest {
    pub sync_secret: String,
}

/// Registry listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClinicsResponse {
    pub clinics: Vec<ClinicView>,
}

/// A registration projected for operators. Never carries credential hashes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicView {
    pub clinic_id: String,
    pub name: String,
    pub short_name: String,
    pub status: ClinicStatus,
    pub sync_enabled: bool,
    pub allowed_collections: Vec<String>,
    pub sync_interval_minutes: i32,
    /// Derived from last contact recency, not stored.
    pub online: bool,
    pub last_push_at: Option<chrono::DateTime<Utc>>,
    pub last_pull_at: Option<chrono::DateTime<Utc>>,
    pub last_sync_at: Option<chrono::DateTime<Utc>>,
    pub last_seen_at: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspension_reason: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl ClinicView {
    fn from_registration(reg: &ClinicRegistration, now: chrono::DateTime<Utc>) -> Self {
        Self {
            clinic_id: reg.clinic_id.clone(),
            name: reg.name.clone(),
            short_name: reg.short_name.clone(),
            status: reg.status,
            sync_enabled: reg.sync_enabled,
            allowed_collections: reg.allowed_collections.clone(),
            sync_interval_minutes: reg.sync_interval_minutes,
            online: reg.is_online(now),
            last_push_at: reg.last_push_at,
            last_pull_at: reg.last_pull_at,
            last_sync_at: reg.last_sync_at,
            last_seen_at: reg.last_seen_at,
            suspension_reason: reg.suspension_reason.clone(),
            created_at: reg.created_at,
        }
    }
}

/// Register a new clinic node in `pending_approval`.
pub async fn handle_register(
    clinics: &dyn ClinicStore,
    request: RegisterClinicRequest,
) -> Result<RegisterClinicResponse> {
    let clinic_id = normalize_clinic_id(&request.clinic_id);
    if clinic_id.is_empty() {
        return Err(AppError::BadRequest("clinic id is required".into()));
    }
    if request.sync_secret.len() < 12 {
        return Err(AppError::BadRequest(
            "sync secret must be at least 12 characters".into(),
        ));
    }
    for collection in &request.allowed_collections {
        if !is_synced_collection(collection) {
            return Err(EngineError::UnknownCollection(collection.clone()).into());
        }
    }

    if clinics.find(&clinic_id).await?.is_some() {
        return Err(AppError::DuplicateClinicId(clinic_id));
    }

    let now = Utc::now();
    let secret_hash = hash_secret(&request.sync_secret)?;
    let api_key = Uuid::new_v4().simple().to_string();

    let mut registration = ClinicRegistration::new(
        &clinic_id,
        request.name,
        request.short_name,
        secret_hash,
        api_key.clone(),
        request.allowed_collections,
        now,
    );
    if let Some(interval) = request.sync_interval_minutes {
        registration.sync_interval_minutes = interval.max(1);
    }

    // A racing duplicate insert still surfaces as 409 via the unique key.
    clinics.insert(&registration).await?;

    tracing::info!(clinic = %clinic_id, "clinic registered, pending approval");

    Ok(RegisterClinicResponse {
        clinic: ClinicView::from_registration(&registration, now),
        api_key,
    })
}

/// Approve a pending (or reinstate a suspended) clinic.
pub async fn handle_approve(
    clinics: &dyn ClinicStore,
    clinic_id: &str,
    request: ApproveClinicRequest,
) -> Result<ClinicView> {
    let clinic_id = normalize_clinic_id(clinic_id);
    let mut registration = clinics
        .find(&clinic_id)
        .await?
        .ok_or_else(|| AppError::ClinicNotFound(clinic_id.clone()))?;

    let now = Utc::now();
    registration.approve(&request.approver, now)?;

    clinics
        .update_status(
            &clinic_id,
            registration.status,
            Some(&request.approver),
            None,
            now,
        )
        .await?;

    tracing::info!(clinic = %clinic_id, approver = %request.approver, "clinic approved");

    Ok(ClinicView::from_registration(&registration, now))
}

/// Suspend a clinic with a reason. Suspended clinics fail authentication
/// until reinstated.
pub async fn handle_suspend(
    clinics: &dyn ClinicStore,
    clinic_id: &str,
    request: SuspendClinicRequest,
) -> Result<ClinicView> {
    let clinic_id = normalize_clinic_id(clinic_id);
    let mut registration = clinics
        .find(&clinic_id)
        .await?
        .ok_or_else(|| AppError::ClinicNotFound(clinic_id.clone()))?;

    let now = Utc::now();
    registration.suspend(&request.reason, now)?;

    clinics
        .update_status(
            &clinic_id,
            registration.status,
            None,
            Some(&request.reason),
            now,
        )
        .await?;

    tracing::warn!(clinic = %clinic_id, reason = %request.reason, "clinic suspended");

    Ok(ClinicView::from_registration(&registration, now))
}

/// Replace a clinic's sync secret.
pub async fn handle_reset_secret(
    clinics: &dyn ClinicStore,
    clinic_id: &str,
    request: ResetSecretRequest,
) -> Result<()> {
    let clinic_id = normalize_clinic_id(clinic_id);
    if request.sync_secret.len() < 12 {
        return Err(AppError::BadRequest(
            "sync secret must be at least 12 characters".into(),
        ));
    }

    if clinics.find(&clinic_id).await?.is_none() {
        return Err(AppError::ClinicNotFound(clinic_id));
    }

    let secret_hash = hash_secret(&request.sync_secret)?;
    clinics
        .update_secret(&clinic_id, &secret_hash, Utc::now())
        .await?;

    tracing::info!(clinic = %clinic_id, "sync secret reset");

    Ok(())
}

/// List all registrations with derived online state.
pub async fn handle_list(clinics: &dyn ClinicStore) -> Result<ListClinicsResponse> {
    let now = Utc::now();
    let all = clinics.list().await?;

    Ok(ListClinicsResponse {
        clinics: all
            .iter()
            .map(|reg| ClinicView::from_registration(reg, now))
            .collect(),
    })
}
