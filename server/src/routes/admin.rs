//! Admin endpoint routes. Master credential only.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::auth::MasterAuth;
use crate::error::Result;
use crate::handlers::{
    handle_approve, handle_list, handle_register, handle_reset_secret, handle_suspend,
    ApproveClinicRequest, ClinicView, ListClinicsResponse, RegisterClinicRequest,
    RegisterClinicResponse, ResetSecretRequest, SuspendClinicRequest,
};
use crate::AppState;

/// Create admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/clinics",
            post(register_handler).get(list_handler),
        )
        .route("/admin/clinics/{clinic_id}/approve", post(approve_handler))
        .route("/admin/clinics/{clinic_id}/suspend", post(suspend_handler))
        .route(
            "/admin/clinics/{clinic_id}/reset-secret",
            post(reset_secret_handler),
        )
}

/// POST /admin/clinics - register a new clinic node.
async fn register_handler(
    State(state): State<AppState>,
    _auth: MasterAuth,
    Json(request): Json<RegisterClinicRequest>,
) -> Result<Json<RegisterClinicResponse>> {
    let response = handle_register(state.clinics.as_ref(), request).await?;
    Ok(Json(response))
}

/// GET /admin/clinics - list registrations.
async fn list_handler(
    State(state): State<AppState>,
    _auth: MasterAuth,
) -> Result<Json<ListClinicsResponse>> {
    let response = handle_list(state.clinics.as_ref()).await?;
    Ok(Json(response))
}

/// POST /admin/clinics/{id}/approve
async fn approve_handler(
    State(state): State<AppState>,
    _auth: MasterAuth,
    Path(clinic_id): Path<String>,
    Json(request): Json<ApproveClinicRequest>,
) -> Result<Json<ClinicView>> {
    let response = handle_approve(state.clinics.as_ref(), &clinic_id, request).await?;
    Ok(Json(response))
}

/// POST /admin/clinics/{id}/suspend
async fn suspend_handler(
    State(state): State<AppState>,
    _auth: MasterAuth,
    Path(clinic_id): Path<String>,
    Json(request): Json<SuspendClinicRequest>,
) -> Result<Json<ClinicView>> {
    let response = handle_suspend(state.clinics.as_ref(), &clinic_id, request).await?;
    Ok(Json(response))
}

/// POST /admin/clinics/{id}/reset-secret
async fn reset_secret_handler(
    State(state): State<AppState>,
    _auth: MasterAuth,
    Path(clinic_id): Path<String>,
    Json(request): Json<ResetSecretRequest>,
) -> Result<Json<serde_json::Value>> {
    handle_reset_secret(state.clinics.as_ref(), &clinic_id, request).await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}
