//! Admin channel publisher and listener.

use resque_common::{config::ResqueConfig, Codec, KeyNamer};
use resque_domain::AdminCommand;
use resque_infrastructure::Publisher;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::Invocation;
use crate::error::AdminError;
use crate::worker::Worker;

/// Publishes admin commands to every listening worker.
#[derive(Clone)]
pub struct AdminChannel {
    publisher: Arc<dyn Publisher>,
    codec: Arc<Codec>,
    channel: String,
}

impl AdminChannel {
    /// Publish on `channel`, already namespaced.
    pub fn new(publisher: Arc<dyn Publisher>, codec: Arc<Codec>, channel: impl Into<String>) -> Self {
        Self {
            publisher,
            codec,
            channel: channel.into(),
        }
    }

    /// Publish on the configured admin channel, `<namespace>:<admin_channel>`.
    pub fn from_config(publisher: Arc<dyn Publisher>, codec: Arc<Codec>, config: &ResqueConfig) -> Self {
        let channel = KeyNamer::new(config.namespace.as_str()).channel(&config.admin_channel);
        Self::new(publisher, codec, channel)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Broadcast `command`. Returns how many subscribers received it.
    #[instrument(skip(self), fields(channel = %self.channel))]
    pub async fn publish(&self, command: &AdminCommand) -> Result<u64, AdminError> {
        let message = self.codec.encode_command(command)?;
        let receivers = self.publisher.publish(&self.channel, &message).await?;
        debug!(command = %command, receivers, "Admin command published");
        Ok(receivers)
    }
}

impl std::fmt::Debug for AdminChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminChannel")
            .field("channel", &self.channel)
            .finish()
    }
}

/// Runs admin commands received on a channel against one worker.
///
/// The subscription loop belongs to the caller; it hands each message to
/// [`AdminListener::on_message`].
pub struct AdminListener {
    codec: Arc<Codec>,
    channel: String,
    worker: Arc<dyn Worker>,
}

impl AdminListener {
    pub fn new(codec: Arc<Codec>, channel: impl Into<String>, worker: Arc<dyn Worker>) -> Self {
        Self {
            codec,
            channel: channel.into(),
            worker,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Handle one pub/sub message.
    ///
    /// Messages from other channels are ignored. Malformed or unknown
    /// commands are logged and dropped so the subscription keeps running.
    pub fn on_message(&self, channel: &str, message: &str) {
        if channel != self.channel {
            debug!(channel, expected = %self.channel, "Ignoring message from another channel");
            return;
        }

        if let Err(e) = self.handle_message(message) {
            warn!(
                worker = self.worker.name(),
                error = %e,
                error_kind = %e.kind(),
                "Dropping admin message"
            );
        }
    }

    /// Decode `message` and run it against the worker.
    pub fn handle_message(&self, message: &str) -> Result<AdminCommand, AdminError> {
        let command = self.codec.decode_command(message)?;
        Invocation::new(command).bind(self.worker.as_ref()).run()?;
        Ok(command)
    }
}

impl std::fmt::Debug for AdminListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminListener")
            .field("channel", &self.channel)
            .field("worker", &self.worker.name())
            .finish()
    }
}
