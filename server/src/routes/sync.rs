//! Sync endpoint routes.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::auth::ClinicAuth;
use crate::error::Result;
use crate::handlers::{
    handle_full_sync, handle_pull, handle_push, FullSyncRequest, FullSyncResponse, PullQuery,
    PullResponse, PushRequest, PushResponse,
};
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync/push", post(push_handler))
        .route("/sync/pull", get(pull_handler))
        .route("/sync/full", post(full_sync_handler))
}

/// POST /sync/push - apply a batch of changes from a clinic node.
async fn push_handler(
    State(state): State<AppState>,
    ClinicAuth(clinic): ClinicAuth,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushResponse>> {
    let response = handle_push(
        state.replicas.as_ref(),
        state.clinics.as_ref(),
        &clinic,
        request,
    )
    .await?;
    Ok(Json(response))
}

/// GET /sync/pull - fetch foreign-clinic changes since a cursor.
async fn pull_handler(
    State(state): State<AppState>,
    ClinicAuth(clinic): ClinicAuth,
    Query(query): Query<PullQuery>,
) -> Result<Json<PullResponse>> {
    let response = handle_pull(
        state.replicas.as_ref(),
        state.clinics.as_ref(),
        &clinic,
        query,
    )
    .await?;
    Ok(Json(response))
}

/// POST /sync/full - bootstrap one collection wholesale.
async fn full_sync_handler(
    State(state): State<AppState>,
    ClinicAuth(clinic): ClinicAuth,
    Json(request): Json<FullSyncRequest>,
) -> Result<Json<FullSyncResponse>> {
    let response = handle_full_sync(
        state.replicas.as_ref(),
        state.clinics.as_ref(),
        &clinic,
        request,
    )
    .await?;
    Ok(Json(response))
}
