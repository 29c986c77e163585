//! API error surface. Every non-2xx response uses the envelope
//! `{ok:false, error, detail?}` where `error` is a stable short code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("missing or invalid auth key")]
    AuthRequired,
    #[error("{0} not found")]
    NotFound(String),
    #[error("feature_not_enabled_in_schema")]
    SchemaGuard,
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
    #[error("job_key_busy")]
    LockBusy,
    #[error(transparent)]
    Store(#[from] jobops_evidence::StoreError),
    #[error(transparent)]
    Core(#[from] jobops_core::CoreError),
    #[error(transparent)]
    Repo(#[from] crate::jobs_repo::RepoError),
}

impl From<crate::scoring::ScoringError> for ApiError {
    fn from(e: crate::scoring::ScoringError) -> Self {
        match e {
            crate::scoring::ScoringError::JobNotFound(key) => ApiError::NotFound(key),
            crate::scoring::ScoringError::Repo(e) => ApiError::Repo(e),
            crate::scoring::ScoringError::Core(e) => ApiError::Core(e),
        }
    }
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::AuthRequired => "auth_required",
            ApiError::NotFound(_) => "not_found",
            ApiError::SchemaGuard => "feature_not_enabled_in_schema",
            ApiError::CollaboratorUnavailable(_) => "collaborator_unavailable",
            ApiError::LockBusy => "job_key_busy",
            ApiError::Store(_) => "store_error",
            ApiError::Core(_) => "core_error",
            ApiError::Repo(_) => "store_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthRequired => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::SchemaGuard => StatusCode::BAD_REQUEST,
            ApiError::CollaboratorUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::LockBusy => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if !matches!(self, ApiError::Validation(_) | ApiError::NotFound(_) | ApiError::SchemaGuard) {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }
        let status = self.status();
        let body = json!({ "ok": false, "error": self.code(), "detail": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_busy_maps_to_stable_code() {
        let err = ApiError::LockBusy;
        assert_eq!(err.code(), "job_key_busy");
    }

    #[test]
    fn schema_guard_is_400_not_500() {
        assert_eq!(ApiError::SchemaGuard.status(), StatusCode::BAD_REQUEST);
    }
}
