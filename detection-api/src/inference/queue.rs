//! Bounded admission queue for inference jobs.
//!
//! Occupancy is the number of queued jobs plus the job the worker is holding.
//! `try_enqueue` fails fast once occupancy reaches capacity; it never waits.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Notify;
use uuid::Uuid;

use super::handle::ResultHandle;
use super::staging::StagedArtifact;

/// One unit of pending inference work.
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub artifact: StagedArtifact,
    pub original_name: String,
    pub handle: ResultHandle,
    pub enqueued_at: Instant,
}

impl Job {
    pub fn new(artifact: StagedArtifact, original_name: String, handle: ResultHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            artifact,
            original_name,
            handle,
            enqueued_at: Instant::now(),
        }
    }

    /// Give up on the job, keeping only the artifact that still needs release.
    pub fn into_artifact(self) -> StagedArtifact {
        self.artifact
    }
}

/// Returned by [`AdmissionQueue::try_enqueue`] when the queue is at capacity.
/// Hands the rejected job back to the caller.
#[derive(Debug)]
pub struct QueueFull(pub Job);

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub capacity: usize,
    pub queued: usize,
    pub in_flight: usize,
}

struct QueueState {
    pending: VecDeque<Job>,
    in_flight: usize,
}

/// Fixed-capacity FIFO with a single consumer.
pub struct AdmissionQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    /// Woken when a job is added.
    notify: Notify,
}

impl AdmissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                pending: VecDeque::with_capacity(capacity),
                in_flight: 0,
            }),
            notify: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `job` at the tail, or hand it back if the queue is full.
    pub fn try_enqueue(&self, job: Job) -> Result<(), QueueFull> {
        {
            let mut state = self.lock();
            if state.pending.len() + state.in_flight >= self.capacity {
                return Err(QueueFull(job));
            }
            state.pending.push_back(job);
        }

        self.notify.notify_one();
        Ok(())
    }

    /// Remove the head job, waiting for one if the queue is empty.
    ///
    /// The job keeps its place in the occupancy count until the returned
    /// [`Slot`] is dropped.
    pub async fn dequeue(&self) -> (Job, Slot<'_>) {
        loop {
            {
                let mut state = self.lock();
                if let Some(job) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return (job, Slot { queue: self });
                }
            }

            // notify_one stores a permit when nobody is waiting, so a job
            // pushed between the check above and this await is not missed.
            self.notify.notified().await;
        }
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            capacity: self.capacity,
            queued: state.pending.len(),
            in_flight: state.in_flight,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Critical sections never panic midway, so a poisoned lock still
        // holds consistent state.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Occupancy held by a job the worker has taken. Released on drop.
#[must_use = "dropping the slot frees the job's place in the queue"]
pub struct Slot<'a> {
    queue: &'a AdmissionQueue,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let mut state = self.queue.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}
