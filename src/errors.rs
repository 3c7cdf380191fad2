use crate::{models::upload::UploadResponse, services::storage_service::StorageError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use tracing::error;

/// A lightweight wrapper for general errors that keeps the message local.
///
/// Rendered as the same `{ "success": false, "message": ... }` body the
/// upload endpoint uses for every failure.
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

    /// Shortcut for a 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
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
        (self.status, Json(UploadResponse::failed(self.message))).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MissingImage
            | StorageError::MissingBucket
            | StorageError::InvalidBucketName { .. } => AppError::bad_request(err.to_string()),
            StorageError::NameExhausted(_) | StorageError::Io(_) => {
                // the client only learns that the write failed; details stay in the log
                error!("storage failure: {}", err);
                AppError::internal("Failed to store image")
            }
        }
    }
}
