//! CloudSense API server.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;

use detection_api::inference::{InferenceService, RoboflowDetector, TempDirStaging};
use detection_api::weather::WeatherClient;
use detection_api::{build_router, logging, AppState, Config};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("cloudsense-api {}", VERSION);
        return Ok(());
    }

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Check config.toml and CLOUDSENSE__* environment variables.",
            e
        )
    })?;

    logging::init(&config.logging.level);
    tracing::info!("Starting cloudsense-api {}", VERSION);

    let missing = config.missing_keys();
    if !missing.is_empty() {
        tracing::warn!("Missing credentials: {}", missing.join(", "));
    }

    // Inference pipeline: one queue, one worker
    let staging = Arc::new(TempDirStaging::new(config.staging.dir()));
    tracing::info!("Staging uploads in {}", staging.dir().display());
    let detector = Arc::new(RoboflowDetector::new(&config.roboflow));
    let inference = Arc::new(InferenceService::start(&config.queue, detector, staging));
    tracing::info!(
        "Inference queue ready: capacity={}, request_timeout={:?}",
        config.queue.capacity,
        inference.request_timeout()
    );

    let weather = WeatherClient::new(&config.weather);
    let state = Arc::new(AppState::new(config.clone(), inference, weather));
    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.api.host, config.api.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
