//! Worker crate errors.

use resque_common::CodecError;
use resque_domain::{AdminCommand, ErrorKind};
use thiserror::Error;

/// Enqueue client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required argument was missing, empty or out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The job cannot be enqueued
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// The client was ended
    #[error("Client has been ended")]
    Closed,

    /// Configuration rejected at connect time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Encoding failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The queue store failed
    #[error(transparent)]
    Store(#[from] resque_infrastructure::Error),
}

impl ClientError {
    /// Error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::InvalidArgument(_) => ErrorKind::Argument,
            ClientError::InvalidJob(_) | ClientError::Closed => ErrorKind::State,
            ClientError::Configuration(_) => ErrorKind::Configuration,
            ClientError::Codec(e) => e.kind(),
            ClientError::Store(e) => e.kind(),
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Admin protocol errors.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The command was run without a worker to act on
    #[error("Admin command {0} has no worker bound")]
    Unbound(AdminCommand),

    /// The message could not be decoded or the command name is unknown
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Publishing failed
    #[error(transparent)]
    Publish(#[from] resque_infrastructure::Error),
}

impl AdminError {
    /// Error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdminError::Unbound(_) => ErrorKind::State,
            AdminError::Codec(e) => e.kind(),
            AdminError::Publish(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_kinds() {
        assert_eq!(ClientError::Closed.kind(), ErrorKind::State);
        assert_eq!(
            ClientError::InvalidArgument("queue".to_string()).kind(),
            ErrorKind::Argument
        );
        let store = resque_infrastructure::Error::TransactionAborted("nil".to_string());
        assert!(ClientError::from(store).is_retryable());
    }

    #[test]
    fn test_admin_error_kinds() {
        let err = AdminError::Unbound(AdminCommand::pause(true));
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(err.to_string().contains("PauseCommand(true)"));
    }
}
