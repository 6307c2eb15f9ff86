//! Queued cloud detection.
//!
//! Uploads are staged to disk, admitted into a bounded FIFO, and processed one
//! at a time by a single worker that runs the blocking detector on tokio's
//! blocking pool. Requests wait for their result with a deadline; a request
//! that gives up does not cancel its job.

mod handle;
mod queue;
mod roboflow;
mod service;
mod staging;
mod worker;

pub use handle::{result_handle, Delivery, InferenceFailure, JobOutcome, ResultHandle, ResultWaiter};
pub use queue::{AdmissionQueue, Job, QueueFull, QueueStats, Slot};
pub use roboflow::RoboflowDetector;
pub use service::InferenceService;
pub use staging::{StagedArtifact, Staging, TempDirStaging};
pub use worker::InferenceWorker;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors raised by a detector.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Roboflow API key is not set. Please set ROBOFLOW_API_KEY.")]
    MissingApiKey,

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("request to inference API failed: {0}")]
    Connection(String),

    #[error("inference API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid inference response: {0}")]
    InvalidResponse(String),
}

/// A blocking cloud detector.
///
/// Implementations may take seconds per call and are only ever invoked from
/// the inference worker, one call at a time, on a blocking-pool thread.
pub trait CloudDetector: Send + Sync + 'static {
    /// Run detection on the staged image at `image`.
    fn detect(&self, image: &Path) -> Result<Value, DetectionError>;
}

/// Successful detection payload returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub filename: String,
    pub predictions: Value,
}

impl DetectionResponse {
    pub fn new(filename: String, predictions: Value) -> Self {
        Self {
            success: true,
            filename,
            predictions,
        }
    }
}
