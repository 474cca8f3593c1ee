use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::CollectError;

/// Structured JSON error body returned by all API error responses.
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Unified application error type.
///
/// Implements [`IntoResponse`] so handlers can return `Result<T, AppError>`
/// and axum will convert errors into structured JSON responses with the
/// appropriate HTTP status code.
#[derive(Debug)]
pub enum AppError {
    /// A collection pass failed at the package step (500).
    CollectionFailed(String),
    /// Internal server error (500).
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::CollectionFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "collection_failed",
                msg,
            ),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };
        (status, Json(ApiErrorBody { code, message })).into_response()
    }
}

impl From<CollectError> for AppError {
    fn from(e: CollectError) -> Self {
        match e {
            CollectError::Task(_) | CollectError::Metrics(_) => AppError::Internal(e.to_string()),
            other => AppError::CollectionFailed(other.to_string()),
        }
    }
}
