//! Error classification shared by every crate in the workspace.
//!
//! Each crate defines its own `thiserror` enum and maps its variants onto
//! [`ErrorKind`], so callers can decide what to do with a failure without
//! matching on every concrete error type.

use std::fmt;

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required input was missing or empty
    Argument,
    /// A precondition on stored or runtime state did not hold
    State,
    /// A store transaction was aborted
    Transaction,
    /// A wire record, date or command name could not be decoded
    Decode,
    /// The connection to the store failed
    Transport,
    /// Configuration could not be loaded or is invalid
    Configuration,
}

impl ErrorKind {
    /// Stable code for logs and metrics labels.
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorKind::Argument => "ARGUMENT_ERROR",
            ErrorKind::State => "STATE_ERROR",
            ErrorKind::Transaction => "TRANSACTION_ERROR",
            ErrorKind::Decode => "DECODE_ERROR",
            ErrorKind::Transport => "TRANSPORT_ERROR",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
        }
    }

    /// Whether the whole operation may succeed if the caller retries it.
    ///
    /// Transactions and transport failures are transient; everything else
    /// fails again with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transaction | ErrorKind::Transport)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Transport.is_retryable());
        assert!(ErrorKind::Transaction.is_retryable());
        assert!(!ErrorKind::Argument.is_retryable());
        assert!(!ErrorKind::State.is_retryable());
        assert!(!ErrorKind::Decode.is_retryable());
    }
}
