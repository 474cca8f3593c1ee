//! Prometheus `/metrics` endpoint.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use super::error::AppError;
use super::AppState;

/// GET /metrics: Prometheus scrape endpoint.
///
/// Encoding waits for any running pass, so it happens on the blocking pool.
pub async fn handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let collector = state.collector.clone();
    let body = tokio::task::spawn_blocking(move || collector.encode())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response())
}
