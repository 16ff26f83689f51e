use crate::services::file_service::{FileServiceError, UploadValidationError};
use crate::services::note_service::NoteServiceError;
use crate::services::object_storage::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for request-level errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.message,
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<UploadValidationError> for AppError {
    fn from(err: UploadValidationError) -> Self {
        let status = match err {
            UploadValidationError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            UploadValidationError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        };
        AppError::new(status, err.to_string())
    }
}

/// Storage failures surface as a generic 5xx; the backend's own message is
/// logged server-side and never reaches the client. Unsupported presign
/// requests are the caller's mistake, not an outage.
impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::PresignUnsupported(_) | StorageError::InvalidObjectName => {
                AppError::bad_request(err.to_string())
            }
            other => {
                tracing::error!("storage backend error: {other}");
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "storage backend unavailable")
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("database error: {err}");
        AppError::internal("internal server error")
    }
}

impl From<FileServiceError> for AppError {
    fn from(err: FileServiceError) -> Self {
        match err {
            FileServiceError::NotFound(_) => AppError::not_found(err.to_string()),
            FileServiceError::Validation(inner) => inner.into(),
            FileServiceError::Storage(inner) => inner.into(),
            FileServiceError::Db(inner) => inner.into(),
        }
    }
}

impl From<NoteServiceError> for AppError {
    fn from(err: NoteServiceError) -> Self {
        match err {
            NoteServiceError::NotFound(_) => AppError::not_found(err.to_string()),
            NoteServiceError::Invalid(msg) => AppError::bad_request(msg),
            NoteServiceError::Db(inner) => inner.into(),
        }
    }
}
