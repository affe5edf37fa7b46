use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::models::ValidationError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Every failure a handler can report, mapped to a status code and a
/// `{"error": ...}` body
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Body was not valid JSON or a field had the wrong type
    #[error("{0}")]
    BadRequest(String),

    /// The addressed entity does not exist
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// A foreign key in the payload points at a missing row
    #[error("{resource} not found")]
    InvalidReference { resource: &'static str },

    /// The store rejected the write with a constraint violation
    #[error("Database integrity error: {0}")]
    Integrity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_)
            | Self::BadRequest(_)
            | Self::InvalidReference { .. }
            | Self::Integrity(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Integrity(detail) => {
                tracing::warn!("Constraint violation: {}", detail);
                "Database integrity error".to_string()
            }
            Self::Internal(detail) => {
                // Log the real cause, return a generic message
                tracing::error!("Internal error: {}", detail);
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if matches!(
                db_err.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ) {
                return Self::Integrity(db_err.message().to_string());
            }
        }
        Self::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
