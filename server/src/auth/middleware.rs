//! Authentication extractors.
//!
//! Every sync call carries two credential headers: the clinic identifier and
//! the long-lived sync secret. Admin operations instead carry the master
//! operator key. The verified registration is threaded explicitly through
//! the request's call graph, never stashed in globals.

use axum::{
    extract::FromRequestParts,
    http::{header::USER_AGENT, request::Parts},
};
use chrono::Utc;
use medsync_engine::{normalize_clinic_id, ClinicRegistration};

use crate::auth::verify_secret;
use crate::error::AppError;
use crate::AppState;

/// Header carrying the clinic identifier.
pub const CLINIC_ID_HEADER: &str = "x-clinic-id";
/// Header carrying the long-lived sync secret.
pub const SYNC_SECRET_HEADER: &str = "x-sync-secret";
/// Header carrying the master operator secret.
pub const MASTER_KEY_HEADER: &str = "x-master-key";

/// A clinic authenticated for this request.
///
/// Extraction verifies the secret against the stored hash and records a
/// heartbeat. A miss is always reported as invalid credentials; callers can
/// not distinguish an unknown clinic from a wrong secret.
#[derive(Debug, Clone)]
pub struct ClinicAuth(pub ClinicRegistration);

impl FromRequestParts<AppState> for ClinicAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let clinic_id = header_value(parts, CLINIC_ID_HEADER);
        let secret = header_value(parts, SYNC_SECRET_HEADER);

        let (Some(clinic_id), Some(secret)) = (clinic_id, secret) else {
            return Err(AppError::MissingCredentials);
        };

        let clinic_id = normalize_clinic_id(&clinic_id);

        let Some(registration) = state.clinics.find_active(&clinic_id).await? else {
            return Err(AppError::InvalidCredentials);
        };

        if !verify_secret(&secret, &registration.secret_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        let ip = header_value(parts, "x-forwarded-for")
            .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
            .filter(|v| !v.is_empty());
        let agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        state
            .clinics
            .record_heartbeat(&clinic_id, Utc::now(), ip, agent)
            .await?;

        Ok(ClinicAuth(registration))
    }
}

/// Proof that the request carried the master operator secret.
///
/// Unrelated to any per-clinic credential; compared against the
/// environment-held `MASTER_SYNC_SECRET`.
#[derive(Debug, Clone, Copy)]
pub struct MasterAuth;

impl FromRequestParts<AppState> for MasterAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(key) = header_value(parts, MASTER_KEY_HEADER) else {
            return Err(AppError::MissingCredentials);
        };

        if key != state.config.master_secret {
            return Err(AppError::MasterRequired);
        }

        Ok(MasterAuth)
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
