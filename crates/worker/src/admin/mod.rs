//! Admin commands: publish them, receive them and run them against a worker.
//!
//! Commands travel on `N:<channel>` as a job-shaped descriptor such as
//! `{"class":"PauseCommand","args":[true]}`. Receivers resolve the class name
//! through the codec's [`CommandRegistry`](resque_common::CommandRegistry),
//! then run the command against the local worker.

mod channel;

pub use channel::{AdminChannel, AdminListener};

use resque_domain::AdminCommand;
use tracing::info;

use crate::error::AdminError;
use crate::worker::Worker;

/// A command paired with the worker it will act on.
///
/// The command itself carries no worker; binding happens here, just before
/// it runs.
#[derive(Clone, Copy)]
pub struct Invocation<'w> {
    command: AdminCommand,
    worker: Option<&'w dyn Worker>,
}

impl<'w> Invocation<'w> {
    /// An unbound invocation.
    pub fn new(command: AdminCommand) -> Self {
        Self {
            command,
            worker: None,
        }
    }

    /// Bind the worker the command acts on.
    pub fn bind(mut self, worker: &'w dyn Worker) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn command(&self) -> AdminCommand {
        self.command
    }

    pub fn is_bound(&self) -> bool {
        self.worker.is_some()
    }

    /// Run the command.
    pub fn run(&self) -> Result<(), AdminError> {
        let worker = self.worker.ok_or(AdminError::Unbound(self.command))?;

        match self.command {
            AdminCommand::Pause { paused } => worker.toggle_pause(paused),
            AdminCommand::Shutdown { now } => worker.end(now),
        }

        info!(worker = worker.name(), command = %self.command, "Admin command applied");
        Ok(())
    }
}

impl std::fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.command)
            .field("worker", &self.worker.map(|w| w.name()))
            .finish()
    }
}
