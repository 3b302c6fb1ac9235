//! Redis key naming.
//!
//! Every key the queue touches is `<namespace>:<part>:<part>...`. The layout
//! is shared with other Resque implementations, so it must not change:
//!
//! | Key | Type |
//! |---|---|
//! | `N:queues` | set of queue names |
//! | `N:queue:<name>` | list (simple) or sorted set (delayed, recurring) |
//! | `N:queue:<name>:recurring` | hash of payload -> frequency in millis |
//! | `N:inflight:<worker>:<queue>` | list of in-flight payloads |
//! | `N:<lockName>` | string holding the lock holder, with TTL |

/// Separator between key parts.
pub const DELIMITER: &str = ":";

/// Registry of simple queue names.
pub const QUEUES: &str = "queues";
/// Prefix of queue keys.
pub const QUEUE: &str = "queue";
/// Prefix of in-flight keys.
pub const INFLIGHT: &str = "inflight";
/// Suffix of the recurring companion hash.
pub const RECURRING: &str = "recurring";

/// Join `namespace` and `parts` with [`DELIMITER`].
///
/// # Examples
///
/// ```
/// use resque_common::keys::key;
///
/// assert_eq!(key("resque", &["queue", "mail"]), "resque:queue:mail");
/// ```
pub fn key(namespace: &str, parts: &[&str]) -> String {
    let mut key = String::from(namespace);
    for part in parts {
        key.push_str(DELIMITER);
        key.push_str(part);
    }
    key
}

/// Companion hash key of a recurring queue key.
pub fn recurring_companion_key(queue_key: &str) -> String {
    format!("{}{}{}", queue_key, DELIMITER, RECURRING)
}

/// Key builder bound to one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamer {
    namespace: String,
}

impl KeyNamer {
    /// Create a namer for `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The namespace every key starts with.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `N:part:part...`
    pub fn key(&self, parts: &[&str]) -> String {
        key(&self.namespace, parts)
    }

    /// `N:queues`
    pub fn queues(&self) -> String {
        self.key(&[QUEUES])
    }

    /// `N:queue:<name>`
    pub fn queue(&self, name: &str) -> String {
        self.key(&[QUEUE, name])
    }

    /// `N:queue:<name>:recurring`
    pub fn recurring(&self, name: &str) -> String {
        recurring_companion_key(&self.queue(name))
    }

    /// `N:inflight:<worker>:<queue>`
    pub fn inflight(&self, worker: &str, queue: &str) -> String {
        self.key(&[INFLIGHT, worker, queue])
    }

    /// `N:<lockName>`
    pub fn lock(&self, lock_name: &str) -> String {
        self.key(&[lock_name])
    }

    /// `N:<channel>`
    pub fn channel(&self, channel: &str) -> String {
        self.key(&[channel])
    }
}
