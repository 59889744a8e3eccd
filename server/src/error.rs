//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medsync_engine::Error as EngineError;
use serde::Serialize;

use crate::db::StoreError;

/// Application error type.
///
/// Auth errors are fatal to the whole request. Per-change errors never reach
/// this type as a response; push stringifies them into the `failed` bucket
/// so one bad change cannot abort its siblings.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("sync is disabled for this clinic")]
    SyncDisabled,

    #[error("master credential required")]
    MasterRequired,

    #[error("clinic already registered: {0}")]
    DuplicateClinicId(String),

    #[error("clinic not found: {0}")]
    ClinicNotFound(String),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Stable machine-readable code surfaced on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingCredentials => "missing_credentials",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::SyncDisabled => "sync_disabled",
            AppError::MasterRequired => "master_required",
            AppError::DuplicateClinicId(_) => "duplicate_clinic_id",
            AppError::ClinicNotFound(_) => "clinic_not_found",
            AppError::Engine(EngineError::UnknownCollection(_)) => "unknown_collection",
            AppError::Engine(EngineError::CollectionNotAllowed(_)) => {
                "not_authorized_for_collection"
            }
            AppError::Engine(_) => "invalid_change",
            AppError::BadRequest(_) => "bad_request",
            AppError::Store(StoreError::Duplicate) => "duplicate_clinic_id",
            AppError::Store(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredentials => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials => StatusCode::FORBIDDEN,
            AppError::SyncDisabled => StatusCode::FORBIDDEN,
            AppError::MasterRequired => StatusCode::FORBIDDEN,
            AppError::DuplicateClinicId(_) => StatusCode::CONFLICT,
            AppError::ClinicNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Engine(EngineError::CollectionNotAllowed(_)) => StatusCode::FORBIDDEN,
            AppError::Engine(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::Duplicate) => StatusCode::CONFLICT,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (error, details) = match &self {
            AppError::Store(StoreError::Database(e)) => {
                tracing::error!("Database error: {:?}", e);
                ("Database error".to_string(), None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error".to_string(), Some(msg.clone()))
            }
            other => (other.to_string(), None),
        };

        let body = Json(ErrorResponse {
            error,
            code,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
