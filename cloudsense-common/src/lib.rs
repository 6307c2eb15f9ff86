//! CloudSense Common Types
//!
//! Shared result shapes for cloud detection and weather reports, plus the
//! pure formatting that turns upstream API payloads into them.

pub mod detection;
pub mod weather;

pub use detection::{
    format_predictions, BoundingBox, DetectionSummary, FormattedDetection, FormattedPrediction,
    ImageDimensions, RawDetection,
};
pub use weather::{
    forecast_entry_count, CurrentWeather, Forecast, ForecastEntry, RawCurrentWeather, RawForecast,
};
