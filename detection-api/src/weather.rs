//! OpenWeatherMap client.

use cloudsense_common::{forecast_entry_count, CurrentWeather, Forecast, RawCurrentWeather, RawForecast};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::WeatherConfig;

/// Errors from the weather API.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Invalid API key for OpenWeatherMap")]
    InvalidApiKey,

    #[error("Location '{0}' not found")]
    LocationNotFound(String),

    #[error("Weather API error: {0}")]
    Api(u16),

    #[error("Unable to connect to weather service")]
    Connection(#[source] reqwest::Error),

    #[error("Invalid weather API response: {0}")]
    InvalidResponse(String),
}

/// Async client for current conditions and 3-hourly forecasts.
pub struct WeatherClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Self {
        if config.api_key.is_empty() {
            tracing::warn!(
                "OpenWeatherMap API key not configured. Set OPENWEATHER_API_KEY to enable weather."
            );
        }

        Self {
            http_client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// Current weather for `location` (`city` or `city,country`).
    pub async fn current_weather(&self, location: &str) -> Result<CurrentWeather, WeatherError> {
        let raw: RawCurrentWeather = self.fetch("weather", location, &[]).await?;
        Ok(raw.into())
    }

    /// Forecast for the next `days` days.
    pub async fn forecast(&self, location: &str, days: u8) -> Result<Forecast, WeatherError> {
        let cnt = forecast_entry_count(days).to_string();
        let raw: RawForecast = self
            .fetch("forecast", location, &[("cnt", cnt.as_str())])
            .await?;
        Ok(Forecast::from_raw(raw, days))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        location: &str,
        extra: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .query(extra)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                tracing::error!("Network error fetching {}: {}", endpoint, e);
                WeatherError::Connection(e)
            })?;

        match response.status() {
            StatusCode::OK => response.json().await.map_err(|e| {
                tracing::error!("Error decoding {} response: {}", endpoint, e);
                WeatherError::InvalidResponse(e.to_string())
            }),
            StatusCode::UNAUTHORIZED => Err(WeatherError::InvalidApiKey),
            StatusCode::NOT_FOUND => Err(WeatherError::LocationNotFound(location.to_string())),
            status => {
                tracing::error!("Weather API returned {} for {}", status, endpoint);
                Err(WeatherError::Api(status.as_u16()))
            }
        }
    }
}
