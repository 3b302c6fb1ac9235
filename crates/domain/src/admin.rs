//! Administrative commands broadcast to running workers.
//!
//! Commands are pure data. Pairing a command with the worker it acts on
//! happens at the call site that executes it, never inside the value.

use crate::job::Job;
use crate::value::Value;
use std::fmt;

/// A command an operator can broadcast to every worker listening on the
/// admin channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminCommand {
    /// Pause (`true`) or resume (`false`) job processing
    Pause {
        /// Target pause state
        paused: bool,
    },
    /// Stop the worker, immediately (`true`) or after the current job
    Shutdown {
        /// Interrupt the running job instead of letting it finish
        now: bool,
    },
}

impl AdminCommand {
    /// Wire name of [`AdminCommand::Pause`].
    pub const PAUSE: &'static str = "PauseCommand";
    /// Wire name of [`AdminCommand::Shutdown`].
    pub const SHUTDOWN: &'static str = "ShutdownCommand";

    /// Pause command.
    pub fn pause(paused: bool) -> Self {
        AdminCommand::Pause { paused }
    }

    /// Shutdown command.
    pub fn shutdown(now: bool) -> Self {
        AdminCommand::Shutdown { now }
    }

    /// Canonical wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            AdminCommand::Pause { .. } => Self::PAUSE,
            AdminCommand::Shutdown { .. } => Self::SHUTDOWN,
        }
    }

    /// Constructor arguments in wire order.
    pub fn args(&self) -> Vec<Value> {
        match *self {
            AdminCommand::Pause { paused } => vec![Value::Bool(paused)],
            AdminCommand::Shutdown { now } => vec![Value::Bool(now)],
        }
    }

    /// The `{class, args}` descriptor published on the admin channel.
    pub fn descriptor(&self) -> Job {
        Job::new(self.name(), self.args())
    }
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminCommand::Pause { paused } => write!(f, "{}({})", Self::PAUSE, paused),
            AdminCommand::Shutdown { now } => write!(f, "{}({})", Self::SHUTDOWN, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor() {
        let job = AdminCommand::pause(true).descriptor();
        assert_eq!(job.class_name, "PauseCommand");
        assert_eq!(job.args, vec![Value::Bool(true)]);

        let job = AdminCommand::shutdown(false).descriptor();
        assert_eq!(job.class_name, "ShutdownCommand");
        assert_eq!(job.args, vec![Value::Bool(false)]);
    }
}
