//! Combined detection and weather endpoint.

use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::routing::post;
use axum::{Json, Router};
use cloudsense_common::CurrentWeather;
use serde::Serialize;
use serde_json::Value;

use super::upload::read_image_upload;
use super::weather::LocationQuery;
use crate::error::Result;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/analyze", post(analyze))
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    success: bool,
    filename: String,
    location: String,
    cloud_detection: Value,
    weather: CurrentWeather,
}

/// POST /analyze - Detect clouds in an image and fetch weather for a city.
///
/// Detection goes through the same inference queue as `/detect-clouds`, so
/// it is subject to the same backpressure and timeout. The weather lookup
/// runs while the job waits.
async fn analyze(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LocationQuery>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>> {
    let upload = read_image_upload(multipart).await?;
    let location = query.location();

    let (detection, weather) = tokio::join!(
        state.inference.submit(upload.filename, upload.data),
        state.weather.current_weather(&location),
    );
    let detection = detection?;
    let weather = weather?;

    Ok(Json(AnalyzeResponse {
        success: true,
        filename: detection.filename,
        location,
        cloud_detection: detection.predictions,
        weather,
    }))
}
