use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use corvus_core::CoreError;
use corvus_jobs::JobsError;
use serde_json::json;

use crate::liveattrs::laconf::LaconfError;

/// Application-level error type for HTTP handlers.
///
/// Wraps domain errors from the core, jobs and db layers and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `corvus_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error from the job engine.
    #[error(transparent)]
    Jobs(#[from] JobsError),

    /// A build-configuration error.
    #[error(transparent)]
    Laconf(#[from] LaconfError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A semantically invalid request (well-formed but unusable).
    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} \"{id}\" not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Job engine errors ---
            AppError::Jobs(jobs) => match jobs {
                JobsError::NoSuchJob(_) | JobsError::NotFinished(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", jobs.to_string())
                }
                JobsError::SelfDependency(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "VALIDATION_ERROR",
                    jobs.to_string(),
                ),
                JobsError::RestartCapReached(_) => {
                    (StatusCode::CONFLICT, "CONFLICT", jobs.to_string())
                }
                other => {
                    tracing::error!(error = %other, "Job engine error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Build configuration errors ---
            AppError::Laconf(laconf) => match laconf {
                LaconfError::NoSuchConfig(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", laconf.to_string())
                }
                LaconfError::Invalid(msg) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "VALIDATION_ERROR",
                    msg.clone(),
                ),
                other => {
                    tracing::error!(error = %other, "Liveattrs configuration error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Unprocessable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                msg.clone(),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn no_such_job_maps_to_404() {
        assert_eq!(
            status_of(AppError::Jobs(JobsError::NoSuchJob("x".into()))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn unfinished_job_maps_to_404() {
        assert_eq!(
            status_of(AppError::Jobs(JobsError::NotFinished("x".into()))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn self_dependency_maps_to_422() {
        assert_eq!(
            status_of(AppError::Jobs(JobsError::SelfDependency("x".into()))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(
            status_of(AppError::Core(CoreError::Validation("bad".into()))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_config_maps_to_404() {
        assert_eq!(
            status_of(AppError::Laconf(LaconfError::NoSuchConfig("c".into()))),
            StatusCode::NOT_FOUND
        );
    }
}
