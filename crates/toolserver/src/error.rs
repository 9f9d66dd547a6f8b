use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;

/// Everything that can go wrong while processing a single job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("extraction timed out after {}s", .0.as_secs())]
    ExtractionTimeout(Duration),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("{0}")]
    EmptyResult(&'static str),

    #[error("packaging failed: {0}")]
    PackagingFailed(String),
}

impl JobError {
    pub(crate) fn packaging(err: impl std::fmt::Display) -> Self {
        Self::PackagingFailed(err.to_string())
    }
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Job(JobError),
}

impl From<JobError> for AppError {
    fn from(value: JobError) -> Self {
        match value {
            JobError::InvalidInput(msg) => Self::BadRequest(msg),
            other => Self::Job(other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => {
                tracing::warn!(detail = %msg, "rejected request");
                (StatusCode::BAD_REQUEST, msg)
            }
            Self::Job(err) => {
                tracing::error!(error = %err, "job failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(serde_json::json!({ "detail": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
