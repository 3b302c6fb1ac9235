//! Resque Domain Types
//!
//! This crate provides the data model shared by producers, workers and
//! operators of a Resque-compatible job queue. Every type here is a plain
//! value: the wire codec lives in `resque-common` and the Redis access layer
//! in `resque-infrastructure`.
//!
//! ## Architecture
//!
//! - **value**: polymorphic JSON-shaped argument values
//! - **job**: job descriptors (`class` + `args` + optional `vars`)
//! - **failure**: failure records produced by workers
//! - **status**: worker status snapshots
//! - **admin**: administrative commands broadcast to workers
//! - **queue**: queue kinds (simple, delayed, recurring)
//! - **errors**: error classification shared by all crates
//!
//! ## Usage
//!
//! ```rust
//! use resque_domain::{Job, Value};
//!
//! let job = Job::new("SendEmail", vec![Value::from("alice@example.com"), Value::from(3)]);
//! assert!(job.is_valid());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod admin;
pub mod errors;
pub mod failure;
pub mod job;
pub mod queue;
pub mod status;
pub mod value;

// Re-export commonly used types
pub use admin::AdminCommand;
pub use errors::ErrorKind;
pub use failure::JobFailure;
pub use job::Job;
pub use queue::QueueKind;
pub use status::WorkerStatus;
pub use value::{Value, ValueMap};
