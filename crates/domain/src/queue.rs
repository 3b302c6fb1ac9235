//! Queue kinds.

use std::fmt;

/// Structural kind a queue name is bound to.
///
/// The kind is not stored anywhere; it is implied by the type of the key(s)
/// backing the queue. An unused name may become any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// FIFO list with optional head insertion
    Simple,
    /// Sorted set scored by ready time
    Delayed,
    /// Sorted set scored by next fire time, plus a frequency hash
    Recurring,
}

impl QueueKind {
    /// Lowercase name used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Simple => "simple",
            QueueKind::Delayed => "delayed",
            QueueKind::Recurring => "recurring",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
