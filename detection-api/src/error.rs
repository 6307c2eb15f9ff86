//! Error types for the detection API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::weather::WeatherError;

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Server is busy. Please slow down live uploads or reduce FPS.")]
    QueueFull,

    #[error("Inference timeout. Try reducing FPS or retrying.")]
    Timeout,

    #[error("Error processing image: {0}")]
    InferenceFailed(String),

    #[error("Error fetching weather: {0}")]
    Weather(#[from] WeatherError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::QueueFull => (StatusCode::TOO_MANY_REQUESTS, "server_busy"),
            Error::Timeout => (StatusCode::SERVICE_UNAVAILABLE, "inference_timeout"),
            Error::InferenceFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "inference_failed"),
            Error::Weather(_) => (StatusCode::INTERNAL_SERVER_ERROR, "weather_failed"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();

        if status.is_server_error() {
            tracing::warn!(error_type, "{}", self);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
