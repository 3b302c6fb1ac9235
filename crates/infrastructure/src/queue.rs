//! Queue data access.
//!
//! A queue name maps to one of three Redis shapes and may only be used as
//! one of them at a time:
//!
//! - simple: list `N:queue:<name>`
//! - delayed: sorted set `N:queue:<name>` scored by ready time (epoch millis)
//! - recurring: the same sorted set scored by next fire time, plus a hash
//!   `N:queue:<name>:recurring` mapping payload to frequency (millis)
//!
//! Every enqueue also registers the name in the `N:queues` set. The kind of a
//! queue is never stored; it is read from the key types before each write.
//! Redis removes empty lists, sets and hashes, so a drained queue is free to
//! take any kind again.

use async_trait::async_trait;
use resque_common::keys::KeyNamer;
use resque_domain::QueueKind;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::store::{KeyType, KvStore, WriteOp};
use crate::{Error, Result};

/// Queue operations.
#[async_trait]
pub trait QueueDao: Send + Sync {
    /// Append a payload to a simple queue.
    async fn enqueue(&self, queue: &str, payload: &str) -> Result<()>;

    /// Insert a payload at the head of a simple queue.
    async fn priority_enqueue(&self, queue: &str, payload: &str) -> Result<()>;

    /// Append several payloads to a simple queue in one transaction.
    async fn batch_enqueue(&self, queue: &str, payloads: &[String]) -> Result<()>;

    /// Schedule a payload to become ready at `ready_at_millis`.
    async fn delayed_enqueue(&self, queue: &str, payload: &str, ready_at_millis: i64)
        -> Result<()>;

    /// Remove a scheduled payload. Absent payloads are ignored.
    async fn remove_delayed_enqueue(&self, queue: &str, payload: &str) -> Result<()>;

    /// Schedule a payload to fire at `next_fire_millis` and every
    /// `frequency_millis` after that.
    async fn recurring_enqueue(
        &self,
        queue: &str,
        payload: &str,
        next_fire_millis: i64,
        frequency_millis: u64,
    ) -> Result<()>;

    /// Stop a recurring payload.
    async fn remove_recurring_enqueue(&self, queue: &str, payload: &str) -> Result<()>;

    /// Move one ready payload of `queue` into the worker's in-flight list.
    async fn dequeue(&self, worker: &str, queue: &str, now_millis: i64) -> Result<Option<String>>;

    /// Drop the worker's in-flight marker once the job is done.
    async fn remove_inflight(&self, worker: &str, queue: &str) -> Result<Option<String>>;

    /// Return the worker's in-flight payload to its queue for re-delivery.
    async fn restore_inflight(
        &self,
        worker: &str,
        queue: &str,
        now_millis: i64,
    ) -> Result<Option<String>>;

    /// Connection health check.
    async fn ping(&self) -> Result<()>;
}

/// Queue, lock and publish operations over a [`KvStore`].
#[derive(Clone)]
pub struct QueueStore {
    pub(crate) store: Arc<dyn KvStore>,
    pub(crate) keys: KeyNamer,
}

impl QueueStore {
    /// Create a queue store.
    pub fn new(store: Arc<dyn KvStore>, keys: KeyNamer) -> Self {
        Self { store, keys }
    }

    /// Key naming used by this store.
    pub fn keys(&self) -> &KeyNamer {
        &self.keys
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    async fn require_simple(&self, queue: &str, queue_key: &str) -> Result<()> {
        match self.store.key_type(queue_key).await? {
            KeyType::None | KeyType::List => Ok(()),
            found => Err(kind_error(queue, QueueKind::Simple, found.to_string())),
        }
    }

    async fn require_delayed(&self, queue: &str, queue_key: &str) -> Result<()> {
        match self.store.key_type(queue_key).await? {
            KeyType::None | KeyType::ZSet => Ok(()),
            found => Err(kind_error(queue, QueueKind::Delayed, found.to_string())),
        }
    }

    async fn require_recurring(&self, queue: &str, queue_key: &str, hash_key: &str) -> Result<()> {
        let queue_type = self.store.key_type(queue_key).await?;
        let hash_type = self.store.key_type(hash_key).await?;
        match (queue_type, hash_type) {
            (KeyType::None, KeyType::None) | (KeyType::ZSet, KeyType::Hash) => Ok(()),
            (queue_type, hash_type) => Err(kind_error(
                queue,
                QueueKind::Recurring,
                format!("{} with companion {}", queue_type, hash_type),
            )),
        }
    }

    async fn push(&self, queue: &str, payloads: Vec<WriteOp>) -> Result<()> {
        let mut ops = Vec::with_capacity(payloads.len() + 1);
        ops.push(WriteOp::SAdd {
            key: self.keys.queues(),
            member: queue.to_string(),
        });
        ops.extend(payloads);
        self.store.transaction(ops).await
    }
}

fn kind_error(queue: &str, expected: QueueKind, found: String) -> Error {
    Error::QueueKind {
        queue: queue.to_string(),
        expected,
        found,
    }
}

fn require_name(queue: &str) -> Result<()> {
    if queue.is_empty() {
        return Err(Error::InvalidArgument("queue must not be empty".to_string()));
    }
    Ok(())
}

#[async_trait]
impl QueueDao for QueueStore {
    #[instrument(skip(self, payload))]
    async fn enqueue(&self, queue: &str, payload: &str) -> Result<()> {
        require_name(queue)?;
        let key = self.keys.queue(queue);
        self.require_simple(queue, &key).await?;
        self.push(
            queue,
            vec![WriteOp::RPush {
                key,
                value: payload.to_string(),
            }],
        )
        .await?;
        debug!(queue = %queue, "Job enqueued");
        Ok(())
    }

    #[instrument(skip(self, payload))]
    async fn priority_enqueue(&self, queue: &str, payload: &str) -> Result<()> {
        require_name(queue)?;
        let key = self.keys.queue(queue);
        self.require_simple(queue, &key).await?;
        self.push(
            queue,
            vec![WriteOp::LPush {
                key,
                value: payload.to_string(),
            }],
        )
        .await?;
        debug!(queue = %queue, "Job enqueued at head");
        Ok(())
    }

    #[instrument(skip(self, payloads), fields(count = payloads.len()))]
    async fn batch_enqueue(&self, queue: &str, payloads: &[String]) -> Result<()> {
        require_name(queue)?;
        if payloads.is_empty() {
            return Ok(());
        }
        let key = self.keys.queue(queue);
        self.require_simple(queue, &key).await?;
        let ops = payloads
            .iter()
            .map(|payload| WriteOp::RPush {
                key: key.clone(),
                value: payload.clone(),
            })
            .collect();
        self.push(queue, ops).await?;
        debug!(queue = %queue, count = payloads.len(), "Jobs enqueued");
        Ok(())
    }

    #[instrument(skip(self, payload))]
    async fn delayed_enqueue(
        &self,
        queue: &str,
        payload: &str,
        ready_at_millis: i64,
    ) -> Result<()> {
        require_name(queue)?;
        let key = self.keys.queue(queue);
        self.require_delayed(queue, &key).await?;
        self.push(
            queue,
            vec![WriteOp::ZAdd {
                key,
                score: ready_at_millis as f64,
                member: payload.to_string(),
            }],
        )
        .await?;
        debug!(queue = %queue, ready_at = ready_at_millis, "Job scheduled");
        Ok(())
    }

    #[instrument(skip(self, payload))]
    async fn remove_delayed_enqueue(&self, queue: &str, payload: &str) -> Result<()> {
        require_name(queue)?;
        let key = self.keys.queue(queue);
        self.require_delayed(queue, &key).await?;
        self.store
            .transaction(vec![WriteOp::ZRem {
                key,
                member: payload.to_string(),
            }])
            .await?;
        debug!(queue = %queue, "Scheduled job removed");
        Ok(())
    }

    #[instrument(skip(self, payload))]
    async fn recurring_enqueue(
        &self,
        queue: &str,
        payload: &str,
        next_fire_millis: i64,
        frequency_millis: u64,
    ) -> Result<()> {
        require_name(queue)?;
        if frequency_millis == 0 {
            return Err(Error::InvalidArgument(
                "frequency must be at least 1 ms".to_string(),
            ));
        }
        let key = self.keys.queue(queue);
        let hash_key = self.keys.recurring(queue);
        self.require_recurring(queue, &key, &hash_key).await?;
        self.push(
            queue,
            vec![
                WriteOp::ZAdd {
                    key,
                    score: next_fire_millis as f64,
                    member: payload.to_string(),
                },
                WriteOp::HSet {
                    key: hash_key,
                    field: payload.to_string(),
                    value: frequency_millis.to_string(),
                },
            ],
        )
        .await?;
        debug!(
            queue = %queue,
            next_fire = next_fire_millis,
            frequency_ms = frequency_millis,
            "Recurring job scheduled"
        );
        Ok(())
    }

    #[instrument(skip(self, payload))]
    async fn remove_recurring_enqueue(&self, queue: &str, payload: &str) -> Result<()> {
        require_name(queue)?;
        let key = self.keys.queue(queue);
        let hash_key = self.keys.recurring(queue);
        self.require_recurring(queue, &key, &hash_key).await?;
        self.store
            .transaction(vec![
                WriteOp::HDel {
                    key: hash_key,
                    field: payload.to_string(),
                },
                WriteOp::ZRem {
                    key,
                    member: payload.to_string(),
                },
            ])
            .await?;
        debug!(queue = %queue, "Recurring job removed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn dequeue(&self, worker: &str, queue: &str, now_millis: i64) -> Result<Option<String>> {
        require_name(queue)?;
        let payload = self
            .store
            .pop_to_inflight(
                &self.keys.queue(queue),
                &self.keys.recurring(queue),
                &self.keys.inflight(worker, queue),
                now_millis,
            )
            .await?;
        if payload.is_some() {
            debug!(queue = %queue, worker = %worker, "Job moved in flight");
        }
        Ok(payload)
    }

    #[instrument(skip(self))]
    async fn remove_inflight(&self, worker: &str, queue: &str) -> Result<Option<String>> {
        self.store
            .pop_inflight(&self.keys.inflight(worker, queue))
            .await
    }

    #[instrument(skip(self))]
    async fn restore_inflight(
        &self,
        worker: &str,
        queue: &str,
        now_millis: i64,
    ) -> Result<Option<String>> {
        let payload = self
            .store
            .restore_inflight(
                &self.keys.inflight(worker, queue),
                &self.keys.queue(queue),
                &self.keys.recurring(queue),
                now_millis,
            )
            .await?;
        if payload.is_some() {
            debug!(queue = %queue, worker = %worker, "In-flight job restored");
        }
        Ok(payload)
    }

    async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}

impl std::fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore")
            .field("namespace", &self.keys.namespace())
            .finish()
    }
}
