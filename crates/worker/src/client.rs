//! Client - enqueue jobs and take locks

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use resque_common::{config::ResqueConfig, datetime, Codec, KeyNamer};
use resque_domain::Job;
use resque_infrastructure::{LockDao, QueueDao, QueueStore, RedisStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::ClientError;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Enqueue client.
///
/// Every operation encodes the job, checks the queue kind and writes in a
/// single store round trip. A client is usable until [`Client::end`] is
/// called; after that every operation fails with [`ClientError::Closed`].
pub struct Client {
    queues: RwLock<Option<QueueStore>>,
    codec: Arc<Codec>,
    check_connection: bool,
}

impl Client {
    /// Create a client over an existing queue store.
    pub fn new(queues: QueueStore, codec: Arc<Codec>) -> Self {
        Self {
            queues: RwLock::new(Some(queues)),
            codec,
            check_connection: false,
        }
    }

    /// Ping the store before every operation.
    pub fn with_check_connection(mut self, check_connection: bool) -> Self {
        self.check_connection = check_connection;
        self
    }

    /// Connect to Redis as described by `config`.
    pub async fn connect(config: &ResqueConfig, codec: Arc<Codec>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        let store = RedisStore::connect(&config.redis).await?;
        let queues = QueueStore::new(Arc::new(store), KeyNamer::new(config.namespace.as_str()));

        info!(
            namespace = %config.namespace,
            check_connection = config.check_connection,
            "Resque client connected"
        );

        Ok(Self::new(queues, codec).with_check_connection(config.check_connection))
    }

    /// Codec used to encode payloads.
    pub fn codec(&self) -> &Arc<Codec> {
        &self.codec
    }

    /// Whether [`Client::end`] has been called.
    pub fn is_closed(&self) -> bool {
        self.queues.read().is_none()
    }

    /// Release the connection. Calling it again is a no-op.
    pub fn end(&self) {
        if self.queues.write().take().is_some() {
            info!("Resque client ended");
        }
    }

    /// Add a job to the tail of a simple queue.
    #[instrument(skip(self, job))]
    pub async fn enqueue(&self, queue: &str, job: Option<&Job>) -> Result<()> {
        let payload = self.payload(queue, job)?;
        self.ready().await?.enqueue(queue, &payload).await?;
        debug!(queue, "Job enqueued");
        Ok(())
    }

    /// Add a job to the head of a simple queue.
    #[instrument(skip(self, job))]
    pub async fn priority_enqueue(&self, queue: &str, job: Option<&Job>) -> Result<()> {
        let payload = self.payload(queue, job)?;
        self.ready().await?.priority_enqueue(queue, &payload).await?;
        debug!(queue, "Job enqueued at head");
        Ok(())
    }

    /// Add several jobs, in order, to the tail of a simple queue.
    ///
    /// Either every job is queued or none is. An empty batch only checks
    /// the queue name.
    #[instrument(skip(self, jobs), fields(count = jobs.len()))]
    pub async fn batch_enqueue(&self, queue: &str, jobs: &[Job]) -> Result<()> {
        require_queue(queue)?;
        let payloads = jobs
            .iter()
            .map(|job| self.encode(job))
            .collect::<Result<Vec<_>>>()?;
        if payloads.is_empty() {
            return Ok(());
        }

        self.ready().await?.batch_enqueue(queue, &payloads).await?;
        debug!(queue, count = payloads.len(), "Jobs enqueued");
        Ok(())
    }

    /// Schedule a job to become ready at `ready_at`, which must be in the future.
    #[instrument(skip(self, job))]
    pub async fn delayed_enqueue(
        &self,
        queue: &str,
        job: Option<&Job>,
        ready_at: DateTime<Utc>,
    ) -> Result<()> {
        let payload = self.payload(queue, job)?;
        require_future(&self.codec, "ready time", &ready_at)?;

        self.ready()
            .await?
            .delayed_enqueue(queue, &payload, datetime::to_epoch_millis(&ready_at))
            .await?;
        debug!(queue, ready_at = %ready_at, "Delayed job enqueued");
        Ok(())
    }

    /// Cancel a scheduled job. Cancelling a job that is not scheduled succeeds.
    #[instrument(skip(self, job))]
    pub async fn remove_delayed_enqueue(&self, queue: &str, job: Option<&Job>) -> Result<()> {
        let payload = self.payload(queue, job)?;
        self.ready()
            .await?
            .remove_delayed_enqueue(queue, &payload)
            .await?;
        Ok(())
    }

    /// Fire a job at `first_fire`, which must be in the future, and then
    /// every `frequency`.
    #[instrument(skip(self, job))]
    pub async fn recurring_enqueue(
        &self,
        queue: &str,
        job: Option<&Job>,
        first_fire: DateTime<Utc>,
        frequency: Duration,
    ) -> Result<()> {
        let payload = self.payload(queue, job)?;
        require_future(&self.codec, "first fire time", &first_fire)?;
        let frequency_millis = u64::try_from(frequency.as_millis()).unwrap_or(u64::MAX);
        if frequency_millis == 0 {
            return Err(ClientError::InvalidArgument(
                "recurring frequency must be at least one millisecond".to_string(),
            ));
        }

        self.ready()
            .await?
            .recurring_enqueue(
                queue,
                &payload,
                datetime::to_epoch_millis(&first_fire),
                frequency_millis,
            )
            .await?;
        debug!(queue, frequency_millis, "Recurring job enqueued");
        Ok(())
    }

    /// Stop a recurring job.
    #[instrument(skip(self, job))]
    pub async fn remove_recurring_enqueue(&self, queue: &str, job: Option<&Job>) -> Result<()> {
        let payload = self.payload(queue, job)?;
        self.ready()
            .await?
            .remove_recurring_enqueue(queue, &payload)
            .await?;
        Ok(())
    }

    /// Try to take (or extend) a named lock for `ttl_seconds`.
    ///
    /// May wait up to two seconds when the lock key has no expiry.
    #[instrument(skip(self))]
    pub async fn acquire_lock(&self, lock_name: &str, holder: &str, ttl_seconds: u64) -> Result<bool> {
        Ok(self
            .ready()
            .await?
            .acquire_lock(lock_name, holder, ttl_seconds)
            .await?)
    }

    /// Release a lock held by `holder`.
    #[instrument(skip(self))]
    pub async fn release_lock(&self, lock_name: &str, holder: &str) -> Result<bool> {
        Ok(self.ready().await?.release_lock(lock_name, holder).await?)
    }

    fn payload(&self, queue: &str, job: Option<&Job>) -> Result<String> {
        require_queue(queue)?;
        let job = job.ok_or_else(|| ClientError::InvalidArgument("job is required".to_string()))?;
        self.encode(job)
    }

    fn encode(&self, job: &Job) -> Result<String> {
        if !job.is_valid() {
            return Err(ClientError::InvalidJob(format!(
                "job class name is empty: {}",
                job
            )));
        }
        Ok(self.codec.encode(job)?)
    }

    async fn ready(&self) -> Result<QueueStore> {
        let queues = self.queues.read().clone().ok_or(ClientError::Closed)?;
        if self.check_connection {
            queues.ping().await?;
        }
        Ok(queues)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("closed", &self.is_closed())
            .field("check_connection", &self.check_connection)
            .finish()
    }
}

fn require_queue(queue: &str) -> Result<()> {
    if queue.is_empty() {
        return Err(ClientError::InvalidArgument(
            "queue name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn require_future(codec: &Codec, what: &str, at: &DateTime<Utc>) -> Result<()> {
    if *at <= datetime::now_utc() {
        return Err(ClientError::InvalidArgument(format!(
            "{} {} is not in the future",
            what,
            codec.format_date(at)
        )));
    }
    Ok(())
}
