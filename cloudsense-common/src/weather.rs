//! Weather report types.
//!
//! Raw types follow the OpenWeatherMap 2.5 `weather` and `forecast` payloads.
//! Every field is optional there, so missing data becomes `None` rather than a
//! decode failure.

use serde::{Deserialize, Serialize};

use crate::detection::round_to;

/// Forecast entries per day (the API reports in 3-hour steps).
pub const ENTRIES_PER_DAY: usize = 8;
/// Most entries the free forecast endpoint returns.
pub const MAX_FORECAST_ENTRIES: usize = 40;

// ============================================================================
// OpenWeatherMap payloads
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCoord {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMain {
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub feels_like: Option<f64>,
    #[serde(default)]
    pub temp_min: Option<f64>,
    #[serde(default)]
    pub temp_max: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCondition {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWind {
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub deg: Option<f64>,
    #[serde(default)]
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClouds {
    #[serde(default)]
    pub all: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSys {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub sunrise: Option<i64>,
    #[serde(default)]
    pub sunset: Option<i64>,
}

/// Response of `GET /weather`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCurrentWeather {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coord: RawCoord,
    #[serde(default)]
    pub weather: Vec<RawCondition>,
    #[serde(default)]
    pub main: RawMain,
    #[serde(default)]
    pub visibility: Option<f64>,
    #[serde(default)]
    pub wind: RawWind,
    #[serde(default)]
    pub clouds: RawClouds,
    #[serde(default)]
    pub sys: RawSys,
    #[serde(default)]
    pub dt: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawForecastEntry {
    #[serde(default)]
    pub dt: Option<i64>,
    #[serde(default)]
    pub main: RawMain,
    #[serde(default)]
    pub weather: Vec<RawCondition>,
    #[serde(default)]
    pub wind: RawWind,
    #[serde(default)]
    pub clouds: RawClouds,
    /// Probability of precipitation, 0.0 to 1.0.
    #[serde(default)]
    pub pop: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub coord: RawCoord,
}

/// Response of `GET /forecast`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawForecast {
    #[serde(default)]
    pub city: RawCity,
    #[serde(default)]
    pub list: Vec<RawForecastEntry>,
}

// ============================================================================
// Client-facing reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub name: Option<String>,
    pub country: Option<String>,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub description: String,
    pub main: Option<String>,
    pub icon: Option<String>,
    /// Kilometres.
    pub visibility: f64,
    /// Not provided by the current weather endpoint.
    pub uv_index: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: Option<f64>,
    pub direction: Option<f64>,
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clouds {
    pub coverage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sun {
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub location: LocationInfo,
    pub current: CurrentConditions,
    pub wind: Wind,
    pub clouds: Clouds,
    pub sun: Sun,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub feels_like: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub main: Option<String>,
    pub description: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precipitation {
    /// Percent.
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub datetime: Option<i64>,
    pub temperature: Temperature,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub weather: Conditions,
    pub wind: Wind,
    pub clouds: Clouds,
    pub precipitation: Precipitation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub location: LocationInfo,
    pub forecast: Vec<ForecastEntry>,
    pub forecast_days: u8,
}

// ============================================================================
// Formatting
// ============================================================================

/// Number of forecast entries to request for `days` days.
pub fn forecast_entry_count(days: u8) -> usize {
    (days as usize * ENTRIES_PER_DAY).min(MAX_FORECAST_ENTRIES)
}

impl From<RawCurrentWeather> for CurrentWeather {
    fn from(raw: RawCurrentWeather) -> Self {
        let condition = raw.weather.into_iter().next().unwrap_or_default();

        Self {
            location: LocationInfo {
                name: raw.name,
                country: raw.sys.country,
                coordinates: raw.coord.into(),
            },
            current: CurrentConditions {
                temperature: round_to(raw.main.temp.unwrap_or(0.0), 1),
                feels_like: round_to(raw.main.feels_like.unwrap_or(0.0), 1),
                humidity: raw.main.humidity,
                pressure: raw.main.pressure,
                description: title_case(condition.description.as_deref().unwrap_or("")),
                main: condition.main,
                icon: condition.icon,
                visibility: raw.visibility.unwrap_or(0.0) / 1000.0,
                uv_index: None,
            },
            wind: raw.wind.into(),
            clouds: raw.clouds.into(),
            sun: Sun {
                sunrise: raw.sys.sunrise,
                sunset: raw.sys.sunset,
            },
            timestamp: raw.dt,
        }
    }
}

impl From<RawForecastEntry> for ForecastEntry {
    fn from(raw: RawForecastEntry) -> Self {
        let condition = raw.weather.into_iter().next().unwrap_or_default();

        Self {
            datetime: raw.dt,
            temperature: Temperature {
                current: round_to(raw.main.temp.unwrap_or(0.0), 1),
                min: round_to(raw.main.temp_min.unwrap_or(0.0), 1),
                max: round_to(raw.main.temp_max.unwrap_or(0.0), 1),
                feels_like: round_to(raw.main.feels_like.unwrap_or(0.0), 1),
            },
            humidity: raw.main.humidity,
            pressure: raw.main.pressure,
            weather: Conditions {
                main: condition.main,
                description: title_case(condition.description.as_deref().unwrap_or("")),
                icon: condition.icon,
            },
            wind: raw.wind.into(),
            clouds: raw.clouds.into(),
            precipitation: Precipitation {
                probability: raw.pop.unwrap_or(0.0) * 100.0,
            },
        }
    }
}

impl Forecast {
    /// Build a forecast report keeping at most `days` days of entries.
    pub fn from_raw(raw: RawForecast, days: u8) -> Self {
        Self {
            location: LocationInfo {
                name: raw.city.name,
                country: raw.city.country,
                coordinates: raw.city.coord.into(),
            },
            forecast: raw
                .list
                .into_iter()
                .take(days as usize * ENTRIES_PER_DAY)
                .map(ForecastEntry::from)
                .collect(),
            forecast_days: days,
        }
    }
}

impl From<RawCoord> for Coordinates {
    fn from(raw: RawCoord) -> Self {
        Self {
            lat: raw.lat,
            lon: raw.lon,
        }
    }
}

impl From<RawWind> for Wind {
    fn from(raw: RawWind) -> Self {
        Self {
            speed: raw.speed,
            direction: raw.deg,
            gust: raw.gust,
        }
    }
}

impl From<RawClouds> for Clouds {
    fn from(raw: RawClouds) -> Self {
        Self { coverage: raw.all }
    }
}

/// Upper-case the first letter of every word, lower-case the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
