use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::collectors::Collector;

pub mod error;
pub mod metrics;
pub mod refresh;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<Collector>,
}

impl AppState {
    pub fn new(collector: Arc<Collector>) -> Self {
        Self { collector }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::handler))
        .route("/refresh", get(refresh::handler).post(refresh::handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Simple health check endpoint.
async fn health() -> &'static str {
    "ok"
}
