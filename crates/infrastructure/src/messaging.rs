//! Messaging module - pub/sub publishing over Redis
//!
//! Admin commands are broadcast on a pub/sub channel. Only the publishing
//! side lives here; subscribers drive their own listen loop and hand each
//! message to the admin listener.

use async_trait::async_trait;
use tracing::instrument;

use crate::queue::QueueStore;
use crate::{Error, Result};

/// Message publisher trait.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `message` on the fully qualified `channel`; returns the number
    /// of subscribers that received it.
    async fn publish(&self, channel: &str, message: &str) -> Result<u64>;
}

#[async_trait]
impl Publisher for QueueStore {
    #[instrument(skip(self, message))]
    async fn publish(&self, channel: &str, message: &str) -> Result<u64> {
        if channel.is_empty() {
            return Err(Error::InvalidArgument("channel must not be empty".to_string()));
        }
        self.store.publish(channel, message).await
    }
}
