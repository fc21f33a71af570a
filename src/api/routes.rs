use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::*;
use super::AppState;

// Room for multipart framing and the radius field
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Oversized uploads must reach the validator so they get a typed rejection
    let body_limit = state
        .pipeline
        .config()
        .upload
        .max_bytes
        .saturating_mul(2)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/analyze/csv", post(analyze_csv))
        .route("/api/legend", get(legend))
        .route("/api/metrics", get(metrics_glossary))
        .route("/api/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
