use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ProgressSnapshot;
use crate::store::StoreError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("user {user_id} is not enrolled in course {course_id}")]
    NotEnrolled { user_id: Uuid, course_id: Uuid },
    #[error("material {material_id} does not belong to course {course_id}")]
    UnknownMaterial { material_id: Uuid, course_id: Uuid },
    #[error("course {0} not found")]
    CourseNotFound(Uuid),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Errors emitted by `PointsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PointsError {
    #[error("invalid award amount {amount}: must be between 1 and {max}")]
    InvalidAmount { amount: i64, max: i64 },
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Errors emitted by the completion coordinator.
///
/// `PartialAward` means step 1 (the completion insert) held but the points
/// credit did not: the material stays complete and the caller retries the
/// same call to deliver the pending award.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompletionError {
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Points(PointsError),
    #[error("material marked complete but points not awarded: {reason}")]
    PartialAward {
        progress: ProgressSnapshot,
        reason: String,
    },
}

/// Everything a route handler can fail with, mapped onto the wire format
/// the client expects: `{"error": {"code", "message"}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or malformed bearer user id")]
    Unauthorized,
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Points(#[from] PointsError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Progress(e) => progress_status(e),
            ApiError::Points(e) => points_status(e),
            ApiError::Completion(CompletionError::Progress(e)) => progress_status(e),
            ApiError::Completion(CompletionError::Points(e)) => points_status(e),
            ApiError::Completion(CompletionError::PartialAward { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "partial_award")
            }
            ApiError::Store(e) => store_status(e),
        }
    }
}

fn progress_status(e: &ProgressError) -> (StatusCode, &'static str) {
    match e {
        ProgressError::NotEnrolled { .. } => (StatusCode::FORBIDDEN, "not_enrolled"),
        ProgressError::UnknownMaterial { .. } => (StatusCode::NOT_FOUND, "unknown_material"),
        ProgressError::CourseNotFound(_) => (StatusCode::NOT_FOUND, "course_not_found"),
        ProgressError::Storage(e) => store_status(e),
    }
}

fn points_status(e: &PointsError) -> (StatusCode, &'static str) {
    match e {
        PointsError::InvalidAmount { .. } => (StatusCode::BAD_REQUEST, "invalid_amount"),
        PointsError::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
        PointsError::Storage(e) => store_status(e),
    }
}

fn store_status(e: &StoreError) -> (StatusCode, &'static str) {
    match e {
        StoreError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable"),
        StoreError::Constraint(_) => (StatusCode::CONFLICT, "storage_conflict"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        let mut body = json!({ "error": { "code": code, "message": self.to_string() } });
        // On a partial award the client needs the saved snapshot to know
        // step 1 held and only the award step should be retried.
        if let ApiError::Completion(CompletionError::PartialAward { progress, .. }) = &self {
            body["progress"] = json!(progress);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_client_statuses() {
        let (status, code) = ApiError::Points(PointsError::InvalidAmount { amount: 0, max: 100 })
            .status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "invalid_amount");

        let (status, code) = ApiError::Progress(ProgressError::NotEnrolled {
            user_id: Uuid::nil(),
            course_id: Uuid::nil(),
        })
        .status_and_code();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "not_enrolled");
    }

    #[test]
    fn transient_storage_errors_are_retryable_statuses() {
        let (status, code) =
            ApiError::Store(StoreError::Unavailable("connection reset".into())).status_and_code();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "storage_unavailable");
    }
}
