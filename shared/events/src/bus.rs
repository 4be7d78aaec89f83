//! In-process pub/sub for job progress
//!
//! Built on `tokio::sync::broadcast`. Events within one job are published
//! from a single task, so subscribers observe them totally ordered. There
//! is no durability: a lagged subscriber skips ahead and re-polls job
//! state for catch-up.

use crate::events::ProgressEvent;
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

/// Progress event fan-out owned by the orchestrator
#[derive(Debug, Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ProgressEvent) {
        tracing::debug!(
            job_id = %event.job_id,
            status = %event.status,
            percentage = %event.percentage,
            "Publishing progress event"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to all jobs
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Subscribe to a single job; events for other jobs are dropped
    pub fn subscribe_job(&self, job_id: Uuid) -> JobSubscription {
        JobSubscription {
            rx: self.tx.subscribe(),
            job_id,
        }
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-job filtered subscription
pub struct JobSubscription {
    rx: broadcast::Receiver<ProgressEvent>,
    job_id: Uuid,
}

impl JobSubscription {
    /// Next event for the subscribed job, or `None` once the bus is closed.
    /// Lag is absorbed by skipping ahead.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.job_id == self.job_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        job_id = %self.job_id,
                        skipped = %skipped,
                        "Progress subscriber lagged"
                    );
                    continue;
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
