//! CloudSense detection API.
//!
//! Cloud-type detection over a queued, single-worker inference pipeline, plus
//! current weather and forecasts from OpenWeatherMap.

pub mod api;
pub mod config;
pub mod error;
pub mod inference;
pub mod logging;
pub mod state;
pub mod test_util;
pub mod weather;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::{middleware, Router};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

/// Build the CORS layer for the configured frontend origins.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .api
        .allowed_origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([header::CONTENT_DISPOSITION])
        .max_age(Duration::from_secs(600))
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.config.api.max_upload_bytes;
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(api::router())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(logging::request_logger))
        .layer(cors)
        .with_state(state)
}
