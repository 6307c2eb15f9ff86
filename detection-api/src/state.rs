//! Shared application state.

use std::sync::Arc;

use crate::config::Config;
use crate::inference::InferenceService;
use crate::weather::WeatherClient;

/// Shared application state passed to all handlers.
pub struct AppState {
    pub config: Config,
    pub inference: Arc<InferenceService>,
    pub weather: WeatherClient,
}

impl AppState {
    pub fn new(config: Config, inference: Arc<InferenceService>, weather: WeatherClient) -> Self {
        Self {
            config,
            inference,
            weather,
        }
    }
}
