//! Configuration for the detection API.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub roboflow: RoboflowConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin of the web frontend, always allowed by CORS.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    /// Additional allowed CORS origins.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Upper bound on request bodies, uploads included.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_url: default_frontend_url(),
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ApiConfig {
    /// Frontend URL followed by the extra origins, empty entries dropped.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = Vec::with_capacity(self.cors_origins.len() + 1);
        for origin in std::iter::once(&self.frontend_url).chain(self.cors_origins.iter()) {
            let origin = origin.trim();
            if !origin.is_empty() && !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_string());
            }
        }
        origins
    }
}

/// Roboflow hosted inference settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RoboflowConfig {
    #[serde(default = "default_roboflow_url")]
    pub api_url: String,
    /// Empty means unconfigured; inference then fails per request.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
}

impl Default for RoboflowConfig {
    fn default() -> Self {
        Self {
            api_url: default_roboflow_url(),
            api_key: String::new(),
            model_id: default_model_id(),
        }
    }
}

/// OpenWeatherMap settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_weather_url")]
    pub base_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_weather_url(),
        }
    }
}

/// Admission queue settings.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Jobs admitted at once, the one being processed included.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    /// How long a request waits for its result before giving up.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl QueueConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_request_timeout()))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StagingConfig {
    /// Directory for staged uploads. Defaults to the system temp dir.
    #[serde(default)]
    pub dir: Option<String>,
}

impl StagingConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_roboflow_url() -> String {
    "https://serverless.roboflow.com".to_string()
}
fn default_model_id() -> String {
    "cloud-types2-vljyy/1".to_string()
}
fn default_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}
fn default_queue_capacity() -> usize {
    4
}
fn default_request_timeout() -> f64 {
    15.0
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Flat environment variable names accepted alongside the prefixed ones.
const FLAT_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("ROBOFLOW_API_URL", "roboflow.api_url"),
    ("ROBOFLOW_API_KEY", "roboflow.api_key"),
    ("ROBOFLOW_MODEL_ID", "roboflow.model_id"),
    ("OPENWEATHER_API_KEY", "weather.api_key"),
    ("weatherLOC", "weather.api_key"),
    ("FRONTEND_URL", "api.frontend_url"),
    ("INFERENCE_QUEUE_MAXSIZE", "queue.capacity"),
    ("INFERENCE_REQUEST_TIMEOUT", "queue.request_timeout_secs"),
];

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Flat variables such as `ROBOFLOW_API_KEY` (`weatherLOC` wins over
    ///    `OPENWEATHER_API_KEY`)
    /// 2. Environment variables (CLOUDSENSE__SECTION__KEY format)
    /// 3. config.toml file (if present)
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigLoader::builder()
            .set_default("api.host", default_host())?
            .set_default("api.port", default_port() as i64)?
            .set_default("queue.capacity", default_queue_capacity() as i64)?
            .set_default("queue.request_timeout_secs", default_request_timeout())?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("CLOUDSENSE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("api.cors_origins"),
            );

        for (var, key) in FLAT_ENV_OVERRIDES {
            if let Some(value) = env::var(var).ok().filter(|v| !v.is_empty()) {
                builder = builder.set_override(*key, value)?;
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Names of the credentials that are still unset.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.roboflow.api_key.is_empty() {
            missing.push("ROBOFLOW_API_KEY");
        }
        if self.roboflow.model_id.is_empty() {
            missing.push("ROBOFLOW_MODEL_ID");
        }
        if self.weather.api_key.is_empty() {
            missing.push("OPENWEATHER_API_KEY");
        }
        missing
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            roboflow: RoboflowConfig::default(),
            weather: WeatherConfig::default(),
            queue: QueueConfig::default(),
            staging: StagingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_queue_config() {
        let queue = QueueConfig::default();
        assert_eq!(queue.capacity, 4);
        assert_eq!(queue.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_invalid_timeout_falls_back_to_default() {
        let queue = QueueConfig {
            capacity: 1,
            request_timeout_secs: -1.0,
        };
        assert_eq!(queue.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_default_api_config() {
        let api = ApiConfig::default();
        assert_eq!(api.host, "0.0.0.0");
        assert_eq!(api.port, 8000);
        assert_eq!(
            api.allowed_origins(),
            vec!["http://localhost:3000", "http://127.0.0.1:3000"]
        );
    }

    #[test]
    fn test_allowed_origins_skips_blank_entries() {
        let api = ApiConfig {
            frontend_url: "https://clouds.example".to_string(),
            cors_origins: vec![" ".to_string(), "https://clouds.example".to_string()],
            ..ApiConfig::default()
        };
        assert_eq!(api.allowed_origins(), vec!["https://clouds.example"]);
    }

    #[test]
    fn test_missing_keys() {
        let mut config = Config::default();
        assert_eq!(
            config.missing_keys(),
            vec!["ROBOFLOW_API_KEY", "OPENWEATHER_API_KEY"]
        );

        config.roboflow.api_key = "rf".to_string();
        config.weather.api_key = "ow".to_string();
        assert!(config.missing_keys().is_empty());
    }

    #[test]
    fn test_staging_dir_defaults_to_temp_dir() {
        assert_eq!(StagingConfig::default().dir(), env::temp_dir());
    }

    /// Sets variables for one test and clears every variable `load` reads,
    /// before and after.
    struct EnvGuard {
        vars: Vec<&'static str>,
    }

    impl EnvGuard {
        fn set(pairs: &[(&'static str, &str)]) -> Self {
            let mut vars: Vec<&'static str> = FLAT_ENV_OVERRIDES.iter().map(|(var, _)| *var).collect();
            vars.extend(pairs.iter().map(|(var, _)| *var));
            for var in &vars {
                env::remove_var(var);
            }
            for (var, value) in pairs {
                env::set_var(var, value);
            }
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for var in &self.vars {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        let _env = EnvGuard::set(&[]);
        let config = Config::load().unwrap();

        assert_eq!(config.queue.capacity, 4);
        assert_eq!(config.queue.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.roboflow.model_id, "cloud-types2-vljyy/1");
        assert_eq!(config.api.port, 8000);
    }

    #[test]
    #[serial]
    fn test_load_flat_overrides() {
        let _env = EnvGuard::set(&[
            ("INFERENCE_QUEUE_MAXSIZE", "7"),
            ("INFERENCE_REQUEST_TIMEOUT", "0.5"),
            ("OPENWEATHER_API_KEY", "owm-key"),
            ("weatherLOC", "loc-key"),
            ("ROBOFLOW_API_KEY", "rf-key"),
        ]);
        let config = Config::load().unwrap();

        assert_eq!(config.queue.capacity, 7);
        assert_eq!(config.queue.request_timeout(), Duration::from_millis(500));
        assert_eq!(config.weather.api_key, "loc-key");
        assert_eq!(config.roboflow.api_key, "rf-key");
    }

    #[test]
    #[serial]
    fn test_load_flat_wins_over_prefixed() {
        let _env = EnvGuard::set(&[
            ("CLOUDSENSE__QUEUE__CAPACITY", "2"),
            ("CLOUDSENSE__WEATHER__API_KEY", "prefixed"),
            ("OPENWEATHER_API_KEY", "flat"),
        ]);
        let config = Config::load().unwrap();

        assert_eq!(config.queue.capacity, 2);
        assert_eq!(config.weather.api_key, "flat");
    }

    #[test]
    #[serial]
    fn test_load_empty_flat_variable_is_ignored() {
        let _env = EnvGuard::set(&[("INFERENCE_QUEUE_MAXSIZE", "")]);
        assert_eq!(Config::load().unwrap().queue.capacity, 4);
    }

    #[test]
    #[serial]
    fn test_load_cors_origins_list() {
        let _env = EnvGuard::set(&[
            ("CLOUDSENSE__API__CORS_ORIGINS", "https://a.example,https://b.example"),
            ("FRONTEND_URL", "https://app.example"),
        ]);
        let config = Config::load().unwrap();

        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(
            config.api.allowed_origins(),
            vec!["https://app.example", "https://a.example", "https://b.example"]
        );
    }
}
