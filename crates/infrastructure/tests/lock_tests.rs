//! Integration tests for the distributed lock.
//!
//! Time is paused so the orphan grace period elapses instantly.

use async_trait::async_trait;
use resque_common::KeyNamer;
use resque_domain::ErrorKind;
use resque_infrastructure::{
    KeyTtl, KeyType, KvStore, LockDao, QueueStore, Result, WriteOp, ORPHAN_GRACE_PERIOD,
};
use resque_testing::{create_test_holder, create_test_queue_store, InMemoryStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LOCK: &str = "nightly-report";
const LOCK_KEY: &str = "resque:nightly-report";

/// Store whose next `EXPIRE` finds the key already gone. When `successor`
/// is set, that holder takes the lock right after the failed expire.
struct ExpiringStore {
    inner: InMemoryStore,
    armed: AtomicBool,
    successor: Option<&'static str>,
}

impl ExpiringStore {
    fn new(inner: InMemoryStore, successor: Option<&'static str>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            successor,
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvStore for ExpiringStore {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn key_type(&self, key: &str) -> Result<KeyType> {
        self.inner.key_type(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool> {
        self.inner.set_nx(key, value).await
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        if !self.armed.swap(false, Ordering::SeqCst) {
            return self.inner.expire(key, seconds).await;
        }
        self.inner.del(key).await?;
        let expired = self.inner.expire(key, seconds).await?;
        if let Some(successor) = self.successor {
            self.inner.set_nx(key, successor).await?;
            self.inner.expire(key, 60).await?;
        }
        Ok(expired)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.inner.ttl(key).await
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.inner.del(key).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        self.inner.compare_and_delete(key, expected).await
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()> {
        self.inner.transaction(ops).await
    }

    async fn pop_to_inflight(
        &self,
        queue_key: &str,
        recurring_key: &str,
        inflight_key: &str,
        now_millis: i64,
    ) -> Result<Option<String>> {
        self.inner
            .pop_to_inflight(queue_key, recurring_key, inflight_key, now_millis)
            .await
    }

    async fn pop_inflight(&self, inflight_key: &str) -> Result<Option<String>> {
        self.inner.pop_inflight(inflight_key).await
    }

    async fn restore_inflight(
        &self,
        inflight_key: &str,
        queue_key: &str,
        recurring_key: &str,
        now_millis: i64,
    ) -> Result<Option<String>> {
        self.inner
            .restore_inflight(inflight_key, queue_key, recurring_key, now_millis)
            .await
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<u64> {
        self.inner.publish(channel, message).await
    }
}

fn expiring_queue_store(
    successor: Option<&'static str>,
) -> (QueueStore, Arc<ExpiringStore>, InMemoryStore) {
    let memory = InMemoryStore::new();
    let expiring = Arc::new(ExpiringStore::new(memory.clone(), successor));
    let store = QueueStore::new(expiring.clone(), KeyNamer::new("resque"));
    (store, expiring, memory)
}

#[tokio::test(start_paused = true)]
async fn test_only_one_holder_at_a_time() {
    let (store, memory) = create_test_queue_store();
    let alice = create_test_holder();
    let bob = create_test_holder();

    assert!(store.acquire_lock(LOCK, &alice, 30).await.unwrap());
    assert!(!store.acquire_lock(LOCK, &bob, 30).await.unwrap());

    assert_eq!(memory.ttl(LOCK_KEY).await.unwrap(), KeyTtl::Expires(30));
}

#[tokio::test(start_paused = true)]
async fn test_holder_extends_its_own_lock() {
    let (store, memory) = create_test_queue_store();
    let alice = create_test_holder();
    assert!(store.acquire_lock(LOCK, &alice, 10).await.unwrap());

    tokio::time::advance(Duration::from_secs(8)).await;
    assert!(store.acquire_lock(LOCK, &alice, 10).await.unwrap());

    assert_eq!(memory.ttl(LOCK_KEY).await.unwrap(), KeyTtl::Expires(10));
}

#[tokio::test(start_paused = true)]
async fn test_expired_lock_can_be_taken() {
    let (store, _) = create_test_queue_store();
    let alice = create_test_holder();
    let bob = create_test_holder();
    assert!(store.acquire_lock(LOCK, &alice, 5).await.unwrap());

    tokio::time::advance(Duration::from_secs(6)).await;

    assert!(store.acquire_lock(LOCK, &bob, 5).await.unwrap());
    assert!(!store.release_lock(LOCK, &alice).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_orphaned_lock_is_reclaimed_after_grace_period() {
    let (store, memory) = create_test_queue_store();
    let bob = create_test_holder();
    memory.set_string(LOCK_KEY, "crashed-holder");
    let started = tokio::time::Instant::now();

    assert!(store.acquire_lock(LOCK, &bob, 30).await.unwrap());

    assert!(started.elapsed() >= ORPHAN_GRACE_PERIOD);
    assert_eq!(memory.get(LOCK_KEY).await.unwrap(), Some(bob));
    assert_eq!(memory.ttl(LOCK_KEY).await.unwrap(), KeyTtl::Expires(30));
}

#[tokio::test(start_paused = true)]
async fn test_own_lock_without_ttl_is_adopted_immediately() {
    let (store, memory) = create_test_queue_store();
    let alice = create_test_holder();
    memory.set_string(LOCK_KEY, &alice);
    let started = tokio::time::Instant::now();

    assert!(store.acquire_lock(LOCK, &alice, 30).await.unwrap());

    assert!(started.elapsed() < ORPHAN_GRACE_PERIOD);
    assert_eq!(memory.ttl(LOCK_KEY).await.unwrap(), KeyTtl::Expires(30));
}

#[tokio::test(start_paused = true)]
async fn test_late_expire_during_grace_period_fails_acquire() {
    let (store, memory) = create_test_queue_store();
    let bob = create_test_holder();
    memory.set_string(LOCK_KEY, "slow-holder");

    let creator = memory.clone();
    let late_expire = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        creator.expire(LOCK_KEY, 60).await.unwrap();
    });

    assert!(!store.acquire_lock(LOCK, &bob, 30).await.unwrap());
    late_expire.await.unwrap();
    assert_eq!(
        memory.get(LOCK_KEY).await.unwrap().as_deref(),
        Some("slow-holder")
    );
}

#[tokio::test(start_paused = true)]
async fn test_key_vanishing_during_grace_period_falls_through() {
    let (store, memory) = create_test_queue_store();
    let bob = create_test_holder();
    memory.set_string(LOCK_KEY, "leaving-holder");

    let creator = memory.clone();
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        creator.del(LOCK_KEY).await.unwrap();
    });

    assert!(store.acquire_lock(LOCK, &bob, 30).await.unwrap());
    release.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_holder_retakes_lock_that_vanished_during_extension() {
    let (store, expiring, memory) = expiring_queue_store(None);
    let alice = create_test_holder();
    assert!(store.acquire_lock(LOCK, &alice, 10).await.unwrap());

    expiring.arm();
    let started = tokio::time::Instant::now();

    assert!(store.acquire_lock(LOCK, &alice, 30).await.unwrap());
    assert!(started.elapsed() < ORPHAN_GRACE_PERIOD);
    assert_eq!(memory.get(LOCK_KEY).await.unwrap(), Some(alice));
    assert_eq!(memory.ttl(LOCK_KEY).await.unwrap(), KeyTtl::Expires(30));
}

#[tokio::test(start_paused = true)]
async fn test_failed_expire_after_create_leaves_successor_alone() {
    let (store, expiring, memory) = expiring_queue_store(Some("next-holder"));
    let alice = create_test_holder();
    expiring.arm();

    assert!(!store.acquire_lock(LOCK, &alice, 30).await.unwrap());

    assert_eq!(
        memory.get(LOCK_KEY).await.unwrap().as_deref(),
        Some("next-holder")
    );
    assert_eq!(memory.ttl(LOCK_KEY).await.unwrap(), KeyTtl::Expires(60));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_acquire_has_one_winner() {
    for _ in 0..10 {
        let (store, memory) = create_test_queue_store();
        let alice = create_test_holder();
        let bob = create_test_holder();

        let first = {
            let store = store.clone();
            let holder = alice.clone();
            tokio::spawn(async move { store.acquire_lock(LOCK, &holder, 30).await })
        };
        let second = {
            let store = store.clone();
            let holder = bob.clone();
            tokio::spawn(async move { store.acquire_lock(LOCK, &holder, 30).await })
        };
        let (first, second) = tokio::join!(first, second);
        let first = first.unwrap().unwrap();
        let second = second.unwrap().unwrap();

        assert!(first ^ second, "alice: {}, bob: {}", first, second);
        let winner = if first { alice } else { bob };
        assert_eq!(memory.get(LOCK_KEY).await.unwrap(), Some(winner));
    }
}

#[tokio::test]
async fn test_release_only_by_holder() {
    let (store, memory) = create_test_queue_store();
    let alice = create_test_holder();
    let bob = create_test_holder();
    assert!(store.acquire_lock(LOCK, &alice, 30).await.unwrap());

    assert!(!store.release_lock(LOCK, &bob).await.unwrap());
    assert!(store.release_lock(LOCK, &alice).await.unwrap());
    assert!(!store.release_lock(LOCK, &alice).await.unwrap());
    assert!(memory.is_empty());
}

#[tokio::test]
async fn test_invalid_lock_arguments() {
    let (store, _) = create_test_queue_store();

    let cases = [("", "holder", 5), (LOCK, "", 5), (LOCK, "holder", 0)];
    for (name, holder, ttl) in cases {
        let err = store.acquire_lock(name, holder, ttl).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }
    assert_eq!(
        store.release_lock("", "holder").await.unwrap_err().kind(),
        ErrorKind::Argument
    );
}
