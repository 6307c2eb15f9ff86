//! Roboflow hosted inference client.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use super::{CloudDetector, DetectionError};
use crate::config::RoboflowConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Blocking client for Roboflow's serverless detection API.
///
/// The HTTP client is built on first use, from the calling (blocking) thread,
/// so the service can start without credentials and fail per request instead.
pub struct RoboflowDetector {
    api_url: String,
    api_key: String,
    model_id: String,
    http_client: OnceLock<Client>,
}

impl RoboflowDetector {
    pub fn new(config: &RoboflowConfig) -> Self {
        if config.api_key.is_empty() {
            tracing::warn!(
                "Roboflow API key not configured. Set ROBOFLOW_API_KEY to enable inference."
            );
        }

        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model_id: config.model_id.trim_matches('/').to_string(),
            http_client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&Client, DetectionError> {
        if self.api_key.is_empty() {
            return Err(DetectionError::MissingApiKey);
        }

        if let Some(client) = self.http_client.get() {
            return Ok(client);
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DetectionError::Connection(e.to_string()))?;
        tracing::info!("Roboflow client initialized for model {}", self.model_id);
        Ok(self.http_client.get_or_init(|| client))
    }

    fn infer(&self, image: &Path) -> Result<Value, DetectionError> {
        let client = self.client()?;
        let encoded = STANDARD.encode(std::fs::read(image)?);
        let url = format!("{}/{}", self.api_url, self.model_id);

        let response = client
            .post(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encoded)
            .send()
            .map_err(|e| DetectionError::Connection(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DetectionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| DetectionError::InvalidResponse(e.to_string()))
    }
}

impl CloudDetector for RoboflowDetector {
    fn detect(&self, image: &Path) -> Result<Value, DetectionError> {
        match self.infer(image) {
            Ok(raw) => {
                tracing::info!("Successfully processed image: {}", image.display());
                Ok(cloudsense_common::format_predictions(raw, &self.model_id))
            }
            Err(e) => {
                tracing::error!("Error during cloud detection: {}", e);
                Err(e)
            }
        }
    }
}
