//! Job failure records written by workers when a job raises.

use crate::job::Job;
use chrono::{DateTime, Utc};

/// Record of a job that failed during execution.
///
/// Workers append these to the failed list; this crate only models them so
/// the codec can read and write them.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    /// Name of the worker that ran the job
    pub worker: String,
    /// Queue the job was popped from, when known
    pub queue: Option<String>,
    /// The job that failed
    pub payload: Job,
    /// Name of the error type that was raised
    pub exception: String,
    /// Error message
    pub error: String,
    /// Backtrace lines, innermost first
    pub backtrace: Vec<String>,
    /// When the failure happened
    pub failed_at: DateTime<Utc>,
    /// When the job was last retried, if ever
    pub retried_at: Option<DateTime<Utc>>,
}

impl JobFailure {
    /// Create a failure record with an empty backtrace.
    pub fn new(
        worker: impl Into<String>,
        payload: Job,
        exception: impl Into<String>,
        error: impl Into<String>,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            worker: worker.into(),
            queue: None,
            payload,
            exception: exception.into(),
            error: error.into(),
            backtrace: Vec::new(),
            failed_at,
            retried_at: None,
        }
    }

    /// Set the queue the job came from.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Set the backtrace.
    pub fn with_backtrace<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backtrace = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the failure as retried at `at`.
    pub fn retried(mut self, at: DateTime<Utc>) -> Self {
        self.retried_at = Some(at);
        self
    }
}
