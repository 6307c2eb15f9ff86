//! Cloud detection result types.
//!
//! `RawDetection` mirrors what the Roboflow hosted inference API returns for an
//! object-detection model. `FormattedDetection` is the shape served to clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Confidence threshold reported in the summary block.
pub const CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Raw object-detection response from Roboflow.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub image: Option<RawImage>,
    #[serde(default)]
    pub predictions: Vec<RawPrediction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawImage {
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPrediction {
    #[serde(default, rename = "class")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

/// Detection result as served to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedDetection {
    pub model_id: String,
    pub image_dimensions: ImageDimensions,
    /// Sorted by confidence, highest first.
    pub predictions: Vec<FormattedPrediction>,
    pub summary: DetectionSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedPrediction {
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub total_detections: usize,
    pub confidence_threshold: f64,
}

impl RawDetection {
    /// Reshape into the client-facing format.
    ///
    /// `fallback_model_id` is used when the response does not name its model,
    /// which is the common case for the hosted API.
    pub fn format(self, fallback_model_id: &str) -> FormattedDetection {
        let image = self.image.unwrap_or(RawImage {
            width: None,
            height: None,
        });

        let mut predictions: Vec<FormattedPrediction> = self
            .predictions
            .into_iter()
            .map(|p| FormattedPrediction {
                class_name: p.class_name,
                confidence: round_to(p.confidence, 3),
                bounding_box: BoundingBox {
                    x: p.x,
                    y: p.y,
                    width: p.width,
                    height: p.height,
                },
            })
            .collect();
        predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        FormattedDetection {
            model_id: self
                .model_id
                .unwrap_or_else(|| fallback_model_id.to_string()),
            image_dimensions: ImageDimensions {
                width: image.width,
                height: image.height,
            },
            summary: DetectionSummary {
                total_detections: predictions.len(),
                confidence_threshold: CONFIDENCE_THRESHOLD,
            },
            predictions,
        }
    }
}

/// Format a raw inference response, or hand it back untouched when it does not
/// look like an object-detection result (classification models, for example).
pub fn format_predictions(raw: Value, fallback_model_id: &str) -> Value {
    match serde_json::from_value::<RawDetection>(raw.clone()) {
        Ok(detection) => serde_json::to_value(detection.format(fallback_model_id)).unwrap_or(raw),
        Err(_) => raw,
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
