//! Redis adapter for the [`KvStore`] port.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};
use resque_common::config::RedisConfig;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::store::{KeyTtl, KeyType, KvStore, WriteOp};
use crate::{Error, Result};

/// Moves one ready item into the in-flight list.
///
/// KEYS: queue, recurring companion, in-flight. ARGV: now (millis).
const POP_TO_INFLIGHT: &str = r#"
    local queue_key = KEYS[1]
    local recurring_key = KEYS[2]
    local inflight_key = KEYS[3]
    local now = ARGV[1]

    local payload = false
    local queue_type = redis.call('TYPE', queue_key).ok
    if queue_type == 'zset' then
        local ready = redis.call('ZRANGEBYSCORE', queue_key, '-inf', now, 'LIMIT', 0, 1)
        if ready[1] then
            payload = ready[1]
            local frequency = redis.call('HGET', recurring_key, payload)
            if frequency then
                redis.call('ZINCRBY', queue_key, frequency, payload)
            else
                redis.call('ZREM', queue_key, payload)
            end
        end
    elseif queue_type == 'list' then
        payload = redis.call('LPOP', queue_key)
    end

    if payload then
        redis.call('LPUSH', inflight_key, payload)
    end
    return payload
"#;

/// Returns the head of the in-flight list to its queue.
///
/// KEYS: in-flight, queue, recurring companion. ARGV: now (millis).
const RESTORE_INFLIGHT: &str = r#"
    local inflight_key = KEYS[1]
    local queue_key = KEYS[2]
    local recurring_key = KEYS[3]
    local now = ARGV[1]

    local payload = redis.call('LPOP', inflight_key)
    if not payload then
        return false
    end

    if redis.call('HEXISTS', recurring_key, payload) == 1 then
        return payload
    end

    if redis.call('TYPE', queue_key).ok == 'zset' then
        redis.call('ZADD', queue_key, now, payload)
    else
        redis.call('LPUSH', queue_key, payload)
    end
    return payload
"#;

/// Deletes a key only while it holds the expected value.
const COMPARE_AND_DELETE: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    else
        return 0
    end
"#;

/// Redis-backed store.
pub struct RedisStore {
    connection: ConnectionManager,
    pop_script: Script,
    restore_script: Script,
    release_script: Script,
}

impl RedisStore {
    /// Connect to Redis.
    #[instrument(skip(config))]
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let url = config.connection_url();
        info!(url = %config.url, database = config.database, "Connecting to Redis");

        let client = Client::open(url)?;
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let connection = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                Error::Connection(format!(
                    "timed out after {}s connecting to {}",
                    config.connect_timeout_secs, config.url
                ))
            })??;

        info!("Redis connected successfully");
        Ok(Self::from_connection(connection))
    }

    /// Wrap an existing connection manager.
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            pop_script: Script::new(POP_TO_INFLIGHT),
            restore_script: Script::new(RESTORE_INFLIGHT),
            release_script: Script::new(COMPARE_AND_DELETE),
        }
    }

    /// Get a connection manager clone for concurrent operations.
    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl KvStore for RedisStore {
    #[instrument(skip(self))]
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn();
        let response = redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        if response != "PONG" {
            return Err(Error::Connection(format!(
                "Unexpected PING response: {}",
                response
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn key_type(&self, key: &str) -> Result<KeyType> {
        let mut conn = self.conn();
        let reply = redis::cmd("TYPE")
            .arg(key)
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(KeyType::parse(&reply))
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    #[instrument(skip(self, value))]
    async fn set_nx(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn();
        let created: bool = conn.set_nx(key, value).await?;
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let mut conn = self.conn();
        let updated = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async::<_, bool>(&mut conn)
            .await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let mut conn = self.conn();
        let ttl = redis::cmd("TTL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(KeyTtl::from_reply(ttl))
    }

    #[instrument(skip(self))]
    async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn();
        let deleted: u64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self, expected))]
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut conn = self.conn();
        let deleted: i64 = self
            .release_script
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }

    #[instrument(skip(self, ops), fields(ops = ops.len()))]
    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            match op {
                WriteOp::SAdd { key, member } => pipe.sadd(key, member).ignore(),
                WriteOp::RPush { key, value } => pipe.rpush(key, value).ignore(),
                WriteOp::LPush { key, value } => pipe.lpush(key, value).ignore(),
                WriteOp::ZAdd { key, score, member } => pipe.zadd(key, member, *score).ignore(),
                WriteOp::ZRem { key, member } => pipe.zrem(key, member).ignore(),
                WriteOp::HSet { key, field, value } => pipe.hset(key, field, value).ignore(),
                WriteOp::HDel { key, field } => pipe.hdel(key, field).ignore(),
            };
        }

        let mut conn = self.conn();
        let reply: redis::Value = pipe.query_async(&mut conn).await?;
        if reply == redis::Value::Nil {
            return Err(Error::TransactionAborted(format!(
                "EXEC discarded {} queued writes",
                ops.len()
            )));
        }

        debug!(ops = ops.len(), "Transaction committed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn pop_to_inflight(
        &self,
        queue_key: &str,
        recurring_key: &str,
        inflight_key: &str,
        now_millis: i64,
    ) -> Result<Option<String>> {
        let mut conn = self.conn();
        let payload: Option<String> = self
            .pop_script
            .key(queue_key)
            .key(recurring_key)
            .key(inflight_key)
            .arg(now_millis)
            .invoke_async(&mut conn)
            .await?;
        Ok(payload)
    }

    #[instrument(skip(self))]
    async fn pop_inflight(&self, inflight_key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        let payload: Option<String> = redis::cmd("LPOP")
            .arg(inflight_key)
            .query_async(&mut conn)
            .await?;
        Ok(payload)
    }

    #[instrument(skip(self))]
    async fn restore_inflight(
        &self,
        inflight_key: &str,
        queue_key: &str,
        recurring_key: &str,
        now_millis: i64,
    ) -> Result<Option<String>> {
        let mut conn = self.conn();
        let payload: Option<String> = self
            .restore_script
            .key(inflight_key)
            .key(queue_key)
            .key(recurring_key)
            .arg(now_millis)
            .invoke_async(&mut conn)
            .await?;
        Ok(payload)
    }

    #[instrument(skip(self, message))]
    async fn publish(&self, channel: &str, message: &str) -> Result<u64> {
        let mut conn = self.conn();
        let receivers: u64 = conn.publish(channel, message).await?;
        debug!(channel = %channel, receivers = receivers, "Message published");
        Ok(receivers)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}
