//! Self-healing distributed lock.
//!
//! A lock is the string key `N:<lockName>` holding the holder's name with a
//! Redis TTL. Acquisition only uses single-key atomic commands:
//!
//! 1. If the key already holds `holder`, extend the TTL and confirm. An
//!    extension that cannot be confirmed falls through to the next steps.
//! 2. If the key exists without a TTL, its creator died between `SETNX` and
//!    `EXPIRE`. Wait [`ORPHAN_GRACE_PERIOD`] for a late `EXPIRE`; if none
//!    arrives the key is reclaimed (or re-adopted when it turns out to be
//!    ours). A TTL appearing during the wait means the creator is alive and
//!    acquisition fails.
//! 3. `SETNX`, then `EXPIRE` and confirm. A failed expire means the key is
//!    already gone, so nothing is deleted.
//!
//! Contention is reported as `Ok(false)`, never as an error.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::queue::QueueStore;
use crate::store::KeyTtl;
use crate::{Error, Result};

/// How long an existing key without TTL is given to receive one before it is
/// treated as orphaned.
pub const ORPHAN_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Distributed lock operations.
#[async_trait]
pub trait LockDao: Send + Sync {
    /// Try to take (or extend) `lock_name` for `holder` for `ttl_seconds`.
    async fn acquire_lock(&self, lock_name: &str, holder: &str, ttl_seconds: u64) -> Result<bool>;

    /// Release `lock_name` if `holder` holds it.
    async fn release_lock(&self, lock_name: &str, holder: &str) -> Result<bool>;
}

fn validate(lock_name: &str, holder: &str) -> Result<()> {
    if lock_name.is_empty() {
        return Err(Error::InvalidArgument("lock name must not be empty".to_string()));
    }
    if holder.is_empty() {
        return Err(Error::InvalidArgument("lock holder must not be empty".to_string()));
    }
    Ok(())
}

impl QueueStore {
    async fn holds(&self, key: &str, holder: &str) -> Result<bool> {
        Ok(self.store.get(key).await?.as_deref() == Some(holder))
    }

    /// `EXPIRE`, then re-read to make sure nobody replaced the holder.
    async fn extend_and_confirm(&self, key: &str, holder: &str, ttl_seconds: u64) -> Result<bool> {
        if !self.store.expire(key, ttl_seconds).await? {
            return Ok(false);
        }
        self.holds(key, holder).await
    }
}

#[async_trait]
impl LockDao for QueueStore {
    #[instrument(skip(self))]
    async fn acquire_lock(&self, lock_name: &str, holder: &str, ttl_seconds: u64) -> Result<bool> {
        validate(lock_name, holder)?;
        if ttl_seconds == 0 {
            return Err(Error::InvalidArgument(
                "lock ttl must be at least 1 second".to_string(),
            ));
        }
        let key = self.keys.lock(lock_name);

        if self.holds(&key, holder).await? {
            if self.extend_and_confirm(&key, holder, ttl_seconds).await? {
                debug!(lock = %key, holder = %holder, "Lock extended");
                return Ok(true);
            }
            debug!(lock = %key, holder = %holder, "Lock changed during extension");
        }

        if self.store.ttl(&key).await? == KeyTtl::Persistent {
            tokio::time::sleep(ORPHAN_GRACE_PERIOD).await;
            match self.store.ttl(&key).await? {
                KeyTtl::Persistent => match self.store.get(&key).await? {
                    Some(current) if current == holder => {
                        if self.extend_and_confirm(&key, holder, ttl_seconds).await? {
                            return Ok(true);
                        }
                    }
                    Some(current) => {
                        warn!(
                            lock = %key,
                            holder = %current,
                            "Reclaiming lock left without expiry"
                        );
                        self.store.compare_and_delete(&key, &current).await?;
                    }
                    None => {}
                },
                KeyTtl::Expires(_) => {
                    debug!(lock = %key, "Lock received an expiry during the grace period");
                    return Ok(false);
                }
                KeyTtl::Missing => {}
            }
        }

        if self.store.set_nx(&key, holder).await? {
            if self.store.expire(&key, ttl_seconds).await? {
                let acquired = self.holds(&key, holder).await?;
                debug!(lock = %key, holder = %holder, acquired = acquired, "Lock created");
                return Ok(acquired);
            }
            debug!(lock = %key, holder = %holder, "Lock expired before its TTL was set");
            return Ok(false);
        }

        debug!(lock = %key, holder = %holder, "Lock held elsewhere");
        Ok(false)
    }

    #[instrument(skip(self))]
    async fn release_lock(&self, lock_name: &str, holder: &str) -> Result<bool> {
        validate(lock_name, holder)?;
        let key = self.keys.lock(lock_name);
        let released = self.store.compare_and_delete(&key, holder).await?;
        debug!(lock = %key, holder = %holder, released = released, "Lock release");
        Ok(released)
    }
}
