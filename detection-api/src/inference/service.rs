//! The inference service handed to request handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::handle::{result_handle, Delivery, ResultWaiter};
use super::queue::{AdmissionQueue, Job, QueueFull, QueueStats};
use super::staging::Staging;
use super::worker::InferenceWorker;
use super::{CloudDetector, DetectionResponse};
use crate::config::QueueConfig;
use crate::error::{Error, Result};

/// Owns one admission queue and the one worker draining it.
///
/// Construct once at startup and share it through the application state.
/// Dropping the service stops its worker.
pub struct InferenceService {
    queue: Arc<AdmissionQueue>,
    staging: Arc<dyn Staging>,
    request_timeout: Duration,
    worker: JoinHandle<()>,
}

impl InferenceService {
    /// Create the queue and spawn its worker. Must be called within a tokio
    /// runtime.
    pub fn start(
        config: &QueueConfig,
        detector: Arc<dyn CloudDetector>,
        staging: Arc<dyn Staging>,
    ) -> Self {
        let queue = Arc::new(AdmissionQueue::new(config.capacity));
        let worker = InferenceWorker::new(queue.clone(), detector, staging.clone()).spawn();

        Self {
            queue,
            staging,
            request_timeout: config.request_timeout(),
            worker,
        }
    }

    /// Stage `image`, queue it for detection and wait for the result.
    ///
    /// Fails fast with [`Error::QueueFull`] when the queue has no room, and
    /// with [`Error::Timeout`] when the result is not ready in time. A timed
    /// out job still runs; its staged file is removed by the worker.
    ///
    /// Staging and admission run on their own task, so dropping this future
    /// (a disconnected client) never strands a staged file: it either ends up
    /// in the queue or is released.
    pub async fn submit(&self, filename: String, image: Bytes) -> Result<DetectionResponse> {
        let admission = tokio::spawn(admit(
            self.queue.clone(),
            self.staging.clone(),
            filename,
            image,
        ));
        let (job_id, waiter) = admission
            .await
            .map_err(|e| Error::Internal(format!("admission task failed: {}", e)))??;

        tracing::debug!(job_id = %job_id, "Queued inference job");

        match waiter.await_with_deadline(self.request_timeout).await {
            Delivery::Success(response) => Ok(response),
            Delivery::Failure(failure) => Err(Error::InferenceFailed(failure.to_string())),
            Delivery::TimedOut => {
                tracing::warn!(
                    job_id = %job_id,
                    timeout_ms = %self.request_timeout.as_millis(),
                    "Timed out waiting for inference result"
                );
                Err(Error::Timeout)
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Stage the upload and enqueue it, releasing the artifact on rejection.
async fn admit(
    queue: Arc<AdmissionQueue>,
    staging: Arc<dyn Staging>,
    filename: String,
    image: Bytes,
) -> Result<(Uuid, ResultWaiter)> {
    let artifact = staging
        .stage(image)
        .await
        .map_err(|e| Error::Internal(format!("failed to stage upload: {}", e)))?;

    let (handle, waiter) = result_handle();
    let job = Job::new(artifact, filename, handle);
    let job_id = job.id;

    if let Err(QueueFull(job)) = queue.try_enqueue(job) {
        tracing::warn!(
            job_id = %job_id,
            capacity = queue.capacity(),
            "Inference queue full, rejecting upload"
        );
        if let Err(e) = staging.release(job.into_artifact()).await {
            tracing::warn!(job_id = %job_id, "Failed to remove rejected upload: {}", e);
        }
        return Err(Error::QueueFull);
    }

    Ok((job_id, waiter))
}

impl Drop for InferenceService {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
