//! Service info and health endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::inference::QueueStats;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

#[derive(Debug, Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
    status: &'static str,
}

/// GET / - Service banner.
async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Cloud Detection & Weather API",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    success: bool,
    service: &'static str,
    missing_keys: Vec<&'static str>,
    healthy: bool,
    queue: QueueStats,
}

/// GET /health - Reports missing credentials and queue occupancy.
///
/// Lets the frontend detect missing configuration before attempting live
/// inference.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let missing_keys = state.config.missing_keys();

    Json(HealthResponse {
        success: true,
        service: "cloud-detection",
        healthy: missing_keys.is_empty(),
        missing_keys,
        queue: state.inference.stats(),
    })
}
