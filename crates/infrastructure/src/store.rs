//! Key-value store port.
//!
//! The queue layer talks to Redis only through [`KvStore`], a small set of
//! single-key primitives plus the few multi-key operations that must be
//! atomic (transactions and the in-flight scripts). [`crate::RedisStore`] is
//! the production adapter; tests use an in-memory double.

use async_trait::async_trait;

use crate::Result;

/// Redis type of a key, as reported by `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Key does not exist
    None,
    /// Plain string
    String,
    /// List
    List,
    /// Set
    Set,
    /// Sorted set
    ZSet,
    /// Hash
    Hash,
    /// Any other type (stream, module type)
    Other,
}

impl KeyType {
    /// Parse a `TYPE` reply.
    pub fn parse(reply: &str) -> Self {
        match reply {
            "none" => KeyType::None,
            "string" => KeyType::String,
            "list" => KeyType::List,
            "set" => KeyType::Set,
            "zset" => KeyType::ZSet,
            "hash" => KeyType::Hash,
            _ => KeyType::Other,
        }
    }

    /// `TYPE` reply spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::None => "none",
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::ZSet => "zset",
            KeyType::Hash => "hash",
            KeyType::Other => "other",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remaining time to live of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist (`TTL` = -2)
    Missing,
    /// Key exists without expiry (`TTL` = -1)
    Persistent,
    /// Seconds until expiry
    Expires(u64),
}

impl KeyTtl {
    /// Interpret a `TTL` reply.
    pub fn from_reply(ttl: i64) -> Self {
        match ttl {
            -1 => KeyTtl::Persistent,
            t if t < 0 => KeyTtl::Missing,
            t => KeyTtl::Expires(t as u64),
        }
    }
}

/// A write queued inside a MULTI/EXEC transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// `SADD key member`
    SAdd { key: String, member: String },
    /// `RPUSH key value`
    RPush { key: String, value: String },
    /// `LPUSH key value`
    LPush { key: String, value: String },
    /// `ZADD key score member`
    ZAdd { key: String, score: f64, member: String },
    /// `ZREM key member`
    ZRem { key: String, member: String },
    /// `HSET key field value`
    HSet { key: String, field: String, value: String },
    /// `HDEL key field`
    HDel { key: String, field: String },
}

impl WriteOp {
    /// Key the operation writes to.
    pub fn key(&self) -> &str {
        match self {
            WriteOp::SAdd { key, .. }
            | WriteOp::RPush { key, .. }
            | WriteOp::LPush { key, .. }
            | WriteOp::ZAdd { key, .. }
            | WriteOp::ZRem { key, .. }
            | WriteOp::HSet { key, .. }
            | WriteOp::HDel { key, .. } => key,
        }
    }
}

/// Primitive store operations the queue layer is built on.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `PING`
    async fn ping(&self) -> Result<()>;

    /// `TYPE key`
    async fn key_type(&self, key: &str) -> Result<KeyType>;

    /// `GET key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `SETNX key value`; true when the key was created.
    async fn set_nx(&self, key: &str, value: &str) -> Result<bool>;

    /// `EXPIRE key seconds`; true when the key exists and the TTL was set.
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool>;

    /// `TTL key`
    async fn ttl(&self, key: &str) -> Result<KeyTtl>;

    /// `DEL key`; true when a key was removed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Delete `key` only if it holds `expected`, atomically.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;

    /// Apply every write or none of them (MULTI/EXEC).
    ///
    /// Fails with [`crate::Error::TransactionAborted`] when the server
    /// discards the transaction.
    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()>;

    /// Atomically move one ready item from `queue_key` to the head of
    /// `inflight_key`.
    ///
    /// Lists pop from the head. Sorted sets take the lowest member scored at
    /// or before `now_millis`; a member with a frequency in `recurring_key`
    /// is rescheduled by that frequency instead of removed.
    async fn pop_to_inflight(
        &self,
        queue_key: &str,
        recurring_key: &str,
        inflight_key: &str,
        now_millis: i64,
    ) -> Result<Option<String>>;

    /// Pop the head of an in-flight list.
    async fn pop_inflight(&self, inflight_key: &str) -> Result<Option<String>>;

    /// Atomically move the head of `inflight_key` back to `queue_key`.
    ///
    /// Sorted sets get the item at score `now_millis`, except recurring
    /// members (present in `recurring_key`), which are dropped because the
    /// pop already rescheduled them. Anything else is pushed to the list
    /// head.
    async fn restore_inflight(
        &self,
        inflight_key: &str,
        queue_key: &str,
        recurring_key: &str,
        now_millis: i64,
    ) -> Result<Option<String>>;

    /// `PUBLISH channel message`; returns the number of receivers.
    async fn publish(&self, channel: &str, message: &str) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_parse() {
        assert_eq!(KeyType::parse("zset"), KeyType::ZSet);
        assert_eq!(KeyType::parse("none"), KeyType::None);
        assert_eq!(KeyType::parse("stream"), KeyType::Other);
        assert_eq!(KeyType::Hash.to_string(), "hash");
    }

    #[test]
    fn test_ttl_reply() {
        assert_eq!(KeyTtl::from_reply(-2), KeyTtl::Missing);
        assert_eq!(KeyTtl::from_reply(-1), KeyTtl::Persistent);
        assert_eq!(KeyTtl::from_reply(30), KeyTtl::Expires(30));
    }

    #[test]
    fn test_write_op_key() {
        let op = WriteOp::HSet {
            key: "h".to_string(),
            field: "f".to_string(),
            value: "1".to_string(),
        };
        assert_eq!(op.key(), "h");
    }
}
