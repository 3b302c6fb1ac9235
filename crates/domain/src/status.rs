//! Worker status snapshots.

use crate::job::Job;
use chrono::{DateTime, Utc};

/// What a worker is processing right now.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStatus {
    /// When the worker started the current job
    pub run_at: DateTime<Utc>,
    /// Queue the job was popped from
    pub queue: String,
    /// The job being processed
    pub payload: Job,
    /// Whether the worker is paused
    pub paused: bool,
}

impl WorkerStatus {
    /// Snapshot of a running (unpaused) worker.
    pub fn new(run_at: DateTime<Utc>, queue: impl Into<String>, payload: Job) -> Self {
        Self {
            run_at,
            queue: queue.into(),
            payload,
            paused: false,
        }
    }

    /// Set the paused flag.
    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }
}
