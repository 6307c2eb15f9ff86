//! HTTP API.

pub mod analyze;
pub mod detect;
pub mod health;
pub mod upload;
pub mod weather;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Build the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::router())
        .merge(detect::router())
        .merge(weather::router())
        .merge(analyze::router())
}
