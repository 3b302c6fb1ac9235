//! Test fixtures for generating domain entities with realistic data.

use chrono::{DateTime, Duration, TimeZone, Utc};
use fake::{
    faker::{
        internet::en::{FreeEmail, Username},
        lorem::en::{Sentence, Word},
        number::en::NumberWithFormat,
    },
    Fake,
};
use resque_common::KeyNamer;
use resque_domain::{Job, JobFailure, Value, WorkerStatus};
use resque_infrastructure::QueueStore;
use std::sync::Arc;

use crate::mocks::InMemoryStore;

/// Namespace used by fixtures.
pub const TEST_NAMESPACE: &str = "resque";

/// A fixed instant for deterministic assertions (2013-03-08T02:26:05Z).
pub fn reference_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_362_709_565, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// A queue name unlikely to collide with other tests.
pub fn unique_queue_name() -> String {
    let word: String = Word().fake();
    format!("{}-{}", word, uuid::Uuid::new_v4().simple())
}

/// A worker name in the usual `host:pid:queues` shape.
pub fn create_test_worker_name(queue: &str) -> String {
    let host: String = Username().fake();
    let pid: String = NumberWithFormat("####").fake();
    format!("{}:{}:{}", host, pid, queue)
}

/// A unique lock holder.
pub fn create_test_holder() -> String {
    format!("holder-{}", uuid::Uuid::new_v4())
}

/// A job with a couple of realistic arguments.
pub fn create_test_job() -> Job {
    let email: String = FreeEmail().fake();
    Job::new("SendEmail", vec![Value::from(email), Value::from(3)])
}

/// A job carrying named variables.
pub fn create_test_job_with_vars() -> Job {
    create_test_job()
        .with_var("subject", Sentence(2..5).fake::<String>())
        .with_var("retries", 2)
}

/// A failure record for `job`.
pub fn create_test_failure(job: Job) -> JobFailure {
    JobFailure::new(
        create_test_worker_name("mail"),
        job,
        "SmtpError",
        Sentence(3..6).fake::<String>(),
        reference_time(),
    )
    .with_queue("mail")
    .with_backtrace(["mailer.rs:42", "worker.rs:108"])
}

/// A status snapshot for a worker running `job`.
pub fn create_test_status(job: Job) -> WorkerStatus {
    WorkerStatus::new(reference_time() - Duration::seconds(30), "mail", job)
}

/// A queue store backed by a fresh in-memory store.
pub fn create_test_queue_store() -> (QueueStore, InMemoryStore) {
    let memory = InMemoryStore::new();
    let store = QueueStore::new(Arc::new(memory.clone()), KeyNamer::new(TEST_NAMESPACE));
    (store, memory)
}
