//! Testing utilities for Resque queues
//!
//! This crate provides:
//! - [`InMemoryStore`], a fault-injectable [`KvStore`](resque_infrastructure::KvStore)
//!   that mimics Redis key types, expiry and empty-key removal
//! - [`RecordingWorker`], a worker that records admin commands applied to it
//! - Fixtures for domain types with realistic data
//! - Property-based testing strategies
//!
//! # Examples
//!
//! ```
//! use resque_testing::{fixtures::*, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! let job = create_test_job();
//! assert!(job.is_valid());
//! assert!(store.is_empty());
//! ```

pub mod fixtures;
pub mod mocks;
pub mod strategies;

// Re-export commonly used types
pub use fixtures::*;
pub use mocks::*;

// Re-export testing dependencies for convenience
pub use fake;
pub use proptest;
