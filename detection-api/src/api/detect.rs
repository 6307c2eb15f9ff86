//! Cloud detection endpoint.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};

use super::upload::read_image_upload;
use crate::error::Result;
use crate::inference::DetectionResponse;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/detect-clouds", post(detect_clouds))
}

/// POST /detect-clouds - Detect cloud types in an uploaded image.
///
/// 429 when the inference queue is full, 503 when the result does not arrive
/// within the request timeout.
async fn detect_clouds(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<DetectionResponse>> {
    let upload = read_image_upload(multipart).await?;
    tracing::debug!(
        "Detection request for {} ({} bytes)",
        upload.filename,
        upload.data.len()
    );

    let response = state.inference.submit(upload.filename, upload.data).await?;
    Ok(Json(response))
}
