//! Infrastructure layer for Resque queues
//!
//! This crate provides:
//! - The [`KvStore`] port and its Redis adapter
//! - Queue data access (simple, delayed and recurring queues, in-flight bookkeeping)
//! - The self-healing distributed lock
//! - Pub/sub publishing for admin commands
//!
//! ## Architecture
//!
//! [`QueueStore`] implements the data-access traits ([`QueueDao`], [`LockDao`],
//! [`Publisher`]) on top of any [`KvStore`], so the same queue logic runs
//! against Redis in production and an in-memory store in tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use resque_common::{config::RedisConfig, KeyNamer};
//! use resque_infrastructure::{QueueDao, QueueStore, RedisStore};
//! use std::sync::Arc;
//!
//! let store = RedisStore::connect(&RedisConfig::default()).await?;
//! let queues = QueueStore::new(Arc::new(store), KeyNamer::new("resque"));
//! queues.enqueue("mail", r#"{"class":"SendEmail","args":[]}"#).await?;
//! ```

pub mod lock;
pub mod messaging;
pub mod queue;
pub mod redis_store;
pub mod store;

use resque_domain::{ErrorKind, QueueKind};

// Re-export commonly used types
pub use lock::{LockDao, ORPHAN_GRACE_PERIOD};
pub use messaging::Publisher;
pub use queue::{QueueDao, QueueStore};
pub use redis_store::RedisStore;
pub use store::{KeyTtl, KeyType, KvStore, WriteOp};

// Re-export result and error types
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure-level errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required argument was empty or out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The queue name is bound to another kind
    #[error("Queue '{queue}' cannot be used as a {expected} queue: found {found}")]
    QueueKind {
        /// Queue name
        queue: String,
        /// Kind the operation needs
        expected: QueueKind,
        /// Redis type(s) found
        found: String,
    },

    /// MULTI/EXEC was discarded; nothing was written
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// Errors from Redis
    #[error("Redis error: {0}")]
    Store(#[from] redis::RedisError),

    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),
}

impl Error {
    /// Error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::Argument,
            Error::QueueKind { .. } => ErrorKind::State,
            Error::TransactionAborted(_) => ErrorKind::Transaction,
            Error::Store(_) | Error::Connection(_) => ErrorKind::Transport,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
