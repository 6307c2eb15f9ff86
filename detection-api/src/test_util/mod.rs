//! Test doubles shared by unit and integration tests.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use serde_json::Value;

use crate::config::{Config, QueueConfig};
use crate::inference::{CloudDetector, DetectionError, InferenceService, StagedArtifact, Staging};
use crate::state::AppState;
use crate::weather::WeatherClient;

pub const MULTIPART_BOUNDARY: &str = "cloudsense-test-boundary";

pub fn queue_config(capacity: usize, request_timeout_secs: f64) -> QueueConfig {
    QueueConfig {
        capacity,
        request_timeout_secs,
    }
}

/// Configuration with credentials filled in and the given queue settings.
pub fn test_config(capacity: usize, request_timeout_secs: f64) -> Config {
    let mut config = Config::default();
    config.roboflow.api_key = "test-roboflow-key".to_string();
    config.weather.api_key = "test-weather-key".to_string();
    config.queue = queue_config(capacity, request_timeout_secs);
    config
}

/// Application state backed by the given detector and staging.
pub fn test_state(
    config: Config,
    detector: Arc<dyn CloudDetector>,
    staging: Arc<dyn Staging>,
) -> Arc<AppState> {
    let inference = Arc::new(InferenceService::start(&config.queue, detector, staging));
    let weather = WeatherClient::new(&config.weather);
    Arc::new(AppState::new(config, inference, weather))
}

/// Build a single-file `multipart/form-data` body using [`MULTIPART_BOUNDARY`].
pub fn multipart_body(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: {c}\r\n\r\n",
        b = MULTIPART_BOUNDARY,
        f = filename,
        c = content_type,
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY)
}

enum Behaviour {
    Respond(Value),
    Fail(String),
    Panic,
}

/// Detector that records every call.
pub struct MockDetector {
    behaviour: Behaviour,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
}

impl MockDetector {
    fn with(behaviour: Behaviour, delay: Duration) -> Self {
        Self {
            behaviour,
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn instant(response: Value) -> Self {
        Self::with(Behaviour::Respond(response), Duration::ZERO)
    }

    /// Blocks the calling thread for `delay` before answering.
    pub fn delayed(response: Value, delay: Duration) -> Self {
        Self::with(Behaviour::Respond(response), delay)
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Behaviour::Fail(message.to_string()), Duration::ZERO)
    }

    pub fn panicking() -> Self {
        Self::with(Behaviour::Panic, Duration::ZERO)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Image paths in the order they were processed.
    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl CloudDetector for MockDetector {
    fn detect(&self, image: &Path) -> Result<Value, DetectionError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(image.to_path_buf());

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match &self.behaviour {
            Behaviour::Respond(value) => Ok(value.clone()),
            Behaviour::Fail(message) => Err(DetectionError::Api {
                status: 503,
                body: message.clone(),
            }),
            Behaviour::Panic => panic!("detector exploded"),
        }
    }
}

/// Staging that keeps nothing on disk and counts creates and deletes.
#[derive(Default)]
pub struct CountingStaging {
    staged: AtomicUsize,
    released: AtomicUsize,
    released_paths: Mutex<Vec<PathBuf>>,
    fail_stage: bool,
    fail_release: bool,
}

impl CountingStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every release attempt is counted, then fails.
    pub fn failing_release() -> Self {
        Self {
            fail_release: true,
            ..Self::default()
        }
    }

    pub fn failing_stage() -> Self {
        Self {
            fail_stage: true,
            ..Self::default()
        }
    }

    pub fn staged(&self) -> usize {
        self.staged.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn released_paths(&self) -> Vec<PathBuf> {
        self.released_paths.lock().unwrap().clone()
    }

    /// Poll until at least `count` releases happened. Returns false on timeout.
    pub async fn wait_for_releases(&self, count: usize, timeout: Duration) -> bool {
        let poll = async {
            while self.released() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }
}

#[async_trait]
impl Staging for CountingStaging {
    async fn stage(&self, _data: Bytes) -> io::Result<StagedArtifact> {
        if self.fail_stage {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        let n = self.staged.fetch_add(1, Ordering::SeqCst);
        Ok(StagedArtifact::new(PathBuf::from(format!(
            "/staged/upload-{}.jpg",
            n
        ))))
    }

    async fn release(&self, artifact: StagedArtifact) -> io::Result<()> {
        self.released_paths
            .lock()
            .unwrap()
            .push(artifact.path().to_path_buf());
        self.released.fetch_add(1, Ordering::SeqCst);
        if self.fail_release {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        Ok(())
    }
}
