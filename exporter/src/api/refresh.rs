use axum::extract::State;

use super::error::AppError;
use super::AppState;

/// GET|POST /refresh: run a collection pass now.
///
/// Only a package-step failure is reported; degraded port sources show up
/// as missing series instead.
pub async fn handler(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.collector.refresh().await?;
    Ok("collection triggered")
}
