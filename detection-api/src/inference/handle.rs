//! Per-job result delivery.

use std::time::Duration;

use tokio::sync::oneshot;

use super::DetectionResponse;

/// A failed job, carrying the detector's message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cloud detection failed: {0}")]
pub struct InferenceFailure(String);

impl InferenceFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<super::DetectionError> for InferenceFailure {
    fn from(err: super::DetectionError) -> Self {
        Self(err.to_string())
    }
}

pub type JobOutcome = Result<DetectionResponse, InferenceFailure>;

/// Create the two halves of a pending result.
pub fn result_handle() -> (ResultHandle, ResultWaiter) {
    let (tx, rx) = oneshot::channel();
    (ResultHandle { tx }, ResultWaiter { rx })
}

/// Producer half, owned by the job.
#[derive(Debug)]
pub struct ResultHandle {
    tx: oneshot::Sender<JobOutcome>,
}

impl ResultHandle {
    /// Deliver the outcome. Consumes the handle, so a result is assigned once.
    ///
    /// Returns `false` when the waiter is gone; the outcome is then dropped.
    pub fn fulfill(self, outcome: JobOutcome) -> bool {
        self.tx.send(outcome).is_ok()
    }

    /// Whether the waiter has stopped listening.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// What a waiter observed.
#[derive(Debug, PartialEq)]
pub enum Delivery {
    Success(DetectionResponse),
    Failure(InferenceFailure),
    TimedOut,
}

/// Consumer half, owned by the request handler.
#[derive(Debug)]
pub struct ResultWaiter {
    rx: oneshot::Receiver<JobOutcome>,
}

impl ResultWaiter {
    /// Wait for the outcome for at most `deadline`.
    ///
    /// Timing out drops the receiver, which marks the handle abandoned. The job
    /// itself keeps going.
    pub async fn await_with_deadline(self, deadline: Duration) -> Delivery {
        match tokio::time::timeout(deadline, self.rx).await {
            Ok(Ok(Ok(response))) => Delivery::Success(response),
            Ok(Ok(Err(failure))) => Delivery::Failure(failure),
            Ok(Err(_)) => Delivery::Failure(InferenceFailure::new(
                "job was dropped before producing a result",
            )),
            Err(_) => Delivery::TimedOut,
        }
    }
}
