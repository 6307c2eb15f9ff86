//! The single inference worker.
//!
//! The worker loop is the only place a detector is called. It takes one job
//! at a time, so at most one inference is running at any moment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::task::JoinHandle;

use super::handle::InferenceFailure;
use super::queue::{AdmissionQueue, Job};
use super::staging::Staging;
use super::{CloudDetector, DetectionResponse};

/// Consumes the admission queue forever.
pub struct InferenceWorker {
    queue: Arc<AdmissionQueue>,
    detector: Arc<dyn CloudDetector>,
    staging: Arc<dyn Staging>,
}

impl InferenceWorker {
    pub fn new(
        queue: Arc<AdmissionQueue>,
        detector: Arc<dyn CloudDetector>,
        staging: Arc<dyn Staging>,
    ) -> Self {
        Self {
            queue,
            detector,
            staging,
        }
    }

    /// Start the worker loop as a tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the worker loop. Never returns.
    pub async fn run(self) {
        tracing::info!(
            "Inference worker started (queue capacity {})",
            self.queue.capacity()
        );

        loop {
            let (job, slot) = self.queue.dequeue().await;
            self.process(job).await;
            drop(slot);
        }
    }

    async fn process(&self, job: Job) {
        let Job {
            id,
            artifact,
            original_name,
            handle,
            enqueued_at,
        } = job;

        let started = Instant::now();
        tracing::debug!(
            job_id = %id,
            filename = %original_name,
            waited_ms = %enqueued_at.elapsed().as_millis(),
            queued = self.queue.stats().queued,
            "Running inference"
        );

        let outcome = self
            .infer(artifact.path().to_path_buf())
            .await
            .map(|predictions| DetectionResponse::new(original_name.clone(), predictions));

        match &outcome {
            Ok(_) => tracing::info!(
                job_id = %id,
                filename = %original_name,
                duration_ms = %started.elapsed().as_millis(),
                "Inference completed"
            ),
            Err(e) => tracing::warn!(
                job_id = %id,
                filename = %original_name,
                duration_ms = %started.elapsed().as_millis(),
                "Inference failed: {}",
                e
            ),
        }

        if !handle.fulfill(outcome) {
            tracing::debug!(job_id = %id, "Waiter gave up; discarding result");
        }

        if let Err(e) = self.staging.release(artifact).await {
            tracing::warn!(job_id = %id, "Failed to remove staged upload: {}", e);
        }
    }

    /// Call the detector on the blocking pool.
    async fn infer(&self, image: PathBuf) -> Result<Value, InferenceFailure> {
        let detector = Arc::clone(&self.detector);
        match tokio::task::spawn_blocking(move || detector.detect(&image)).await {
            Ok(Ok(predictions)) => Ok(predictions),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(InferenceFailure::new(format!("detector task aborted: {}", e))),
        }
    }
}
