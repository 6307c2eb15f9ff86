//! Weather endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use cloudsense_common::{CurrentWeather, Forecast};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::AppState;

const DEFAULT_FORECAST_DAYS: i64 = 5;
const MAX_FORECAST_DAYS: i64 = 5;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/weather", get(current_weather))
        .route("/weather/forecast", get(forecast))
}

/// `?city=...&country=...`
#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub city: String,
    #[serde(default)]
    pub country: Option<String>,
}

impl LocationQuery {
    pub fn location(&self) -> String {
        format_location(&self.city, self.country.as_deref())
    }
}

/// `?city=...&country=...&days=...`
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub city: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub days: Option<i64>,
}

impl ForecastQuery {
    pub fn location(&self) -> String {
        format_location(&self.city, self.country.as_deref())
    }
}

/// `city`, or `city,country` when a country code is given.
fn format_location(city: &str, country: Option<&str>) -> String {
    match country.map(str::trim) {
        Some(country) if !country.is_empty() => format!("{},{}", city, country),
        _ => city.to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct WeatherResponse {
    success: bool,
    location: String,
    weather: CurrentWeather,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    success: bool,
    location: String,
    forecast: Forecast,
}

/// GET /weather - Current weather for a city.
async fn current_weather(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<WeatherResponse>> {
    let location = query.location();
    let weather = state.weather.current_weather(&location).await?;

    Ok(Json(WeatherResponse {
        success: true,
        location,
        weather,
    }))
}

/// GET /weather/forecast - Forecast for 1 to 5 days.
async fn forecast(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<ForecastResponse>> {
    let days = query.days.unwrap_or(DEFAULT_FORECAST_DAYS);
    if !(1..=MAX_FORECAST_DAYS).contains(&days) {
        return Err(Error::InvalidRequest(
            "Days must be between 1 and 5".to_string(),
        ));
    }

    let location = query.location();
    let forecast = state.weather.forecast(&location, days as u8).await?;

    Ok(Json(ForecastResponse {
        success: true,
        location,
        forecast,
    }))
}
