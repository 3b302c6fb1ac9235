//! Mock implementations for the store and worker collaborators.
//!
//! Provides in-memory doubles for testing without a Redis server.

use async_trait::async_trait;
use parking_lot::RwLock;
use resque_infrastructure::{Error, KeyTtl, KeyType, KvStore, Result, WriteOp};
use resque_worker::Worker;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    ZSet(HashMap<String, f64>),
    Hash(HashMap<String, String>),
}

impl Entry {
    fn key_type(&self) -> KeyType {
        match self {
            Entry::Str(_) => KeyType::String,
            Entry::List(_) => KeyType::List,
            Entry::Set(_) => KeyType::Set,
            Entry::ZSet(_) => KeyType::ZSet,
            Entry::Hash(_) => KeyType::Hash,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Entry::Str(_) => false,
            Entry::List(items) => items.is_empty(),
            Entry::Set(members) => members.is_empty(),
            Entry::ZSet(members) => members.is_empty(),
            Entry::Hash(fields) => fields.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct State {
    keys: HashMap<String, Slot>,
    published: Vec<(String, String)>,
    subscribers: HashMap<String, u64>,
    fail_next_transaction: bool,
    fail_all: bool,
    transactions: usize,
}

fn wrong_type(key: &str) -> Error {
    Error::Store(redis::RedisError::from((
        redis::ErrorKind::TypeError,
        "WRONGTYPE Operation against a key holding the wrong kind of value",
        key.to_string(),
    )))
}

fn connection_refused() -> Error {
    Error::Store(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "Connection refused",
    )))
}

/// Expired keys are dropped on access, like Redis lazy expiry.
fn purge(keys: &mut HashMap<String, Slot>, key: &str) {
    let expired = keys
        .get(key)
        .and_then(|slot| slot.expires_at)
        .is_some_and(|at| at <= Instant::now());
    if expired {
        keys.remove(key);
    }
}

/// Containers are removed once empty, like Redis does.
fn prune(keys: &mut HashMap<String, Slot>, key: &str) {
    if keys.get(key).is_some_and(|slot| slot.entry.is_empty()) {
        keys.remove(key);
    }
}

fn lowest_ready(members: &HashMap<String, f64>, max_score: f64) -> Option<String> {
    members
        .iter()
        .filter(|(_, score)| **score <= max_score)
        .min_by(|a, b| a.1.total_cmp(b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(member, _)| member.clone())
}

macro_rules! container {
    ($keys:expr, $key:expr, $variant:ident, $new:expr) => {{
        purge($keys, $key);
        let slot = $keys.entry($key.to_string()).or_insert_with(|| Slot {
            entry: Entry::$variant($new),
            expires_at: None,
        });
        match &mut slot.entry {
            Entry::$variant(inner) => Ok(inner),
            _ => Err(wrong_type($key)),
        }
    }};
}

fn apply(keys: &mut HashMap<String, Slot>, op: &WriteOp) -> Result<()> {
    match op {
        WriteOp::SAdd { key, member } => {
            container!(keys, key, Set, BTreeSet::new())?.insert(member.clone());
        }
        WriteOp::RPush { key, value } => {
            container!(keys, key, List, VecDeque::new())?.push_back(value.clone());
        }
        WriteOp::LPush { key, value } => {
            container!(keys, key, List, VecDeque::new())?.push_front(value.clone());
        }
        WriteOp::ZAdd { key, score, member } => {
            container!(keys, key, ZSet, HashMap::new())?.insert(member.clone(), *score);
        }
        WriteOp::ZRem { key, member } => {
            container!(keys, key, ZSet, HashMap::new())?.remove(member);
        }
        WriteOp::HSet { key, field, value } => {
            container!(keys, key, Hash, HashMap::new())?.insert(field.clone(), value.clone());
        }
        WriteOp::HDel { key, field } => {
            container!(keys, key, Hash, HashMap::new())?.remove(field);
        }
    }
    prune(keys, op.key());
    Ok(())
}

/// In-memory [`KvStore`] for tests.
///
/// Mirrors the Redis behaviour the queue layer depends on: key types,
/// `WRONGTYPE` errors, lazy TTL expiry on the tokio clock (so paused-time
/// tests control it), removal of empty containers and all-or-nothing
/// transactions. Failures can be injected.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next transaction fail as if EXEC was discarded.
    pub fn fail_next_transaction(&self) {
        self.state.write().fail_next_transaction = true;
    }

    /// Make every operation fail with a connection error (or stop doing so).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().fail_all = unavailable;
    }

    /// Number of committed transactions.
    pub fn transaction_count(&self) -> usize {
        self.state.read().transactions
    }

    /// Report `count` subscribers on `channel`.
    pub fn set_subscribers(&self, channel: &str, count: u64) {
        self.state.write().subscribers.insert(channel.to_string(), count);
    }

    /// Messages published so far, as `(channel, message)`.
    pub fn published(&self) -> Vec<(String, String)> {
        self.state.read().published.clone()
    }

    /// Write a string key without TTL.
    pub fn set_string(&self, key: &str, value: &str) {
        self.state.write().keys.insert(
            key.to_string(),
            Slot {
                entry: Entry::Str(value.to_string()),
                expires_at: None,
            },
        );
    }

    /// Type of `key`, without going through the async port.
    pub fn type_of(&self, key: &str) -> KeyType {
        let mut state = self.state.write();
        purge(&mut state.keys, key);
        state
            .keys
            .get(key)
            .map_or(KeyType::None, |slot| slot.entry.key_type())
    }

    /// List contents, head first.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.state.read().keys.get(key).map(|slot| &slot.entry) {
            Some(Entry::List(items)) => items.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Set members, sorted.
    pub fn members(&self, key: &str) -> Vec<String> {
        match self.state.read().keys.get(key).map(|slot| &slot.entry) {
            Some(Entry::Set(members)) => members.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Sorted set contents ordered by score, then member.
    pub fn zset(&self, key: &str) -> Vec<(String, f64)> {
        match self.state.read().keys.get(key).map(|slot| &slot.entry) {
            Some(Entry::ZSet(members)) => {
                let mut items: Vec<_> = members.iter().map(|(m, s)| (m.clone(), *s)).collect();
                items.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                items
            }
            _ => Vec::new(),
        }
    }

    /// Hash field value.
    pub fn hget(&self, key: &str, field: &str) -> Option<String> {
        match self.state.read().keys.get(key).map(|slot| &slot.entry) {
            Some(Entry::Hash(fields)) => fields.get(field).cloned(),
            _ => None,
        }
    }

    /// True when no key is stored.
    pub fn is_empty(&self) -> bool {
        self.state.read().keys.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.state.read().fail_all {
            return Err(connection_refused());
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        self.check_available()
    }

    async fn key_type(&self, key: &str) -> Result<KeyType> {
        self.check_available()?;
        Ok(self.type_of(key))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let mut state = self.state.write();
        purge(&mut state.keys, key);
        match state.keys.get(key).map(|slot| &slot.entry) {
            None => Ok(None),
            Some(Entry::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write();
        purge(&mut state.keys, key);
        if state.keys.contains_key(key) {
            return Ok(false);
        }
        state.keys.insert(
            key.to_string(),
            Slot {
                entry: Entry::Str(value.to_string()),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write();
        purge(&mut state.keys, key);
        match state.keys.get_mut(key) {
            Some(slot) => {
                slot.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.check_available()?;
        let mut state = self.state.write();
        purge(&mut state.keys, key);
        Ok(match state.keys.get(key) {
            None => KeyTtl::Missing,
            Some(Slot {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Slot {
                expires_at: Some(at),
                ..
            }) => {
                let remaining = at.saturating_duration_since(Instant::now());
                KeyTtl::Expires((remaining.as_millis() as u64).div_ceil(1000))
            }
        })
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write();
        purge(&mut state.keys, key);
        Ok(state.keys.remove(key).is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write();
        purge(&mut state.keys, key);
        let matches = matches!(
            state.keys.get(key).map(|slot| &slot.entry),
            Some(Entry::Str(value)) if value == expected
        );
        if matches {
            state.keys.remove(key);
        }
        Ok(matches)
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write();
        if std::mem::take(&mut state.fail_next_transaction) {
            return Err(Error::TransactionAborted(
                "EXEC discarded the transaction".to_string(),
            ));
        }

        let mut staged = state.keys.clone();
        for op in &ops {
            apply(&mut staged, op)?;
        }
        state.keys = staged;
        state.transactions += 1;
        Ok(())
    }

    async fn pop_to_inflight(
        &self,
        queue_key: &str,
        recurring_key: &str,
        inflight_key: &str,
        now_millis: i64,
    ) -> Result<Option<String>> {
        self.check_available()?;
        let mut guard = self.state.write();
        let keys = &mut guard.keys;
        purge(keys, queue_key);
        purge(keys, recurring_key);

        let frequency = |keys: &HashMap<String, Slot>, member: &str| -> Option<f64> {
            match keys.get(recurring_key).map(|slot| &slot.entry) {
                Some(Entry::Hash(fields)) => fields.get(member).and_then(|f| f.parse().ok()),
                _ => None,
            }
        };

        let payload = match keys.get(queue_key).map(|slot| slot.entry.key_type()) {
            Some(KeyType::ZSet) => {
                let ready = match keys.get(queue_key).map(|slot| &slot.entry) {
                    Some(Entry::ZSet(members)) => lowest_ready(members, now_millis as f64),
                    _ => None,
                };
                if let Some(member) = &ready {
                    let step = frequency(keys, member);
                    if let Some(Entry::ZSet(members)) =
                        keys.get_mut(queue_key).map(|slot| &mut slot.entry)
                    {
                        match step {
                            Some(step) => {
                                if let Some(score) = members.get_mut(member) {
                                    *score += step;
                                }
                            }
                            None => {
                                members.remove(member);
                            }
                        }
                    }
                    prune(keys, queue_key);
                }
                ready
            }
            Some(KeyType::List) => {
                let popped = match keys.get_mut(queue_key).map(|slot| &mut slot.entry) {
                    Some(Entry::List(items)) => items.pop_front(),
                    _ => None,
                };
                prune(keys, queue_key);
                popped
            }
            _ => None,
        };

        if let Some(payload) = &payload {
            apply(
                keys,
                &WriteOp::LPush {
                    key: inflight_key.to_string(),
                    value: payload.clone(),
                },
            )?;
        }
        Ok(payload)
    }

    async fn pop_inflight(&self, inflight_key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let mut state = self.state.write();
        let keys = &mut state.keys;
        purge(keys, inflight_key);
        let popped = match keys.get_mut(inflight_key).map(|slot| &mut slot.entry) {
            None => None,
            Some(Entry::List(items)) => items.pop_front(),
            Some(_) => return Err(wrong_type(inflight_key)),
        };
        prune(keys, inflight_key);
        Ok(popped)
    }

    async fn restore_inflight(
        &self,
        inflight_key: &str,
        queue_key: &str,
        recurring_key: &str,
        now_millis: i64,
    ) -> Result<Option<String>> {
        self.check_available()?;
        let mut state = self.state.write();
        let keys = &mut state.keys;
        purge(keys, inflight_key);
        let payload = match keys.get_mut(inflight_key).map(|slot| &mut slot.entry) {
            Some(Entry::List(items)) => items.pop_front(),
            _ => None,
        };
        prune(keys, inflight_key);
        let Some(payload) = payload else {
            return Ok(None);
        };

        let recurring = matches!(
            keys.get(recurring_key).map(|slot| &slot.entry),
            Some(Entry::Hash(fields)) if fields.contains_key(&payload)
        );
        if recurring {
            return Ok(Some(payload));
        }

        purge(keys, queue_key);
        let op = match keys.get(queue_key).map(|slot| slot.entry.key_type()) {
            Some(KeyType::ZSet) => WriteOp::ZAdd {
                key: queue_key.to_string(),
                score: now_millis as f64,
                member: payload.clone(),
            },
            _ => WriteOp::LPush {
                key: queue_key.to_string(),
                value: payload.clone(),
            },
        };
        apply(keys, &op)?;
        Ok(Some(payload))
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<u64> {
        self.check_available()?;
        let mut state = self.state.write();
        state
            .published
            .push((channel.to_string(), message.to_string()));
        Ok(state.subscribers.get(channel).copied().unwrap_or(0))
    }
}

/// What an admin command did to a [`RecordingWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEvent {
    TogglePause(bool),
    End(bool),
}

/// Worker double that records the admin commands applied to it.
pub struct RecordingWorker {
    name: String,
    paused: AtomicBool,
    ended: AtomicBool,
    events: RwLock<Vec<WorkerEvent>>,
}

impl RecordingWorker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            paused: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            events: RwLock::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<WorkerEvent> {
        self.events.read().clone()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

impl Worker for RecordingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn toggle_pause(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
        self.events.write().push(WorkerEvent::TogglePause(paused));
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn end(&self, now: bool) {
        self.ended.store(true, Ordering::SeqCst);
        self.events.write().push(WorkerEvent::End(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wrong_type_leaves_state_untouched() {
        let store = InMemoryStore::new();
        store.set_string("k", "v");
        let result = store
            .transaction(vec![
                WriteOp::SAdd {
                    key: "s".to_string(),
                    member: "m".to_string(),
                },
                WriteOp::RPush {
                    key: "k".to_string(),
                    value: "x".to_string(),
                },
            ])
            .await;
        assert!(result.is_err());
        assert_eq!(store.type_of("s"), KeyType::None);
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_containers_are_removed() {
        let store = InMemoryStore::new();
        let add = WriteOp::ZAdd {
            key: "z".to_string(),
            score: 1.0,
            member: "m".to_string(),
        };
        let rem = WriteOp::ZRem {
            key: "z".to_string(),
            member: "m".to_string(),
        };
        store.transaction(vec![add]).await.unwrap();
        assert_eq!(store.type_of("z"), KeyType::ZSet);
        store.transaction(vec![rem]).await.unwrap();
        assert_eq!(store.type_of("z"), KeyType::None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_expire_on_the_tokio_clock() {
        let store = InMemoryStore::new();
        assert!(store.set_nx("lock", "a").await.unwrap());
        assert_eq!(store.ttl("lock").await.unwrap(), KeyTtl::Persistent);
        assert!(store.expire("lock", 5).await.unwrap());
        assert_eq!(store.ttl("lock").await.unwrap(), KeyTtl::Expires(5));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.ttl("lock").await.unwrap(), KeyTtl::Missing);
        assert_eq!(store.get("lock").await.unwrap(), None);
    }

    #[test]
    fn test_recording_worker() {
        let worker = RecordingWorker::new("w1");
        worker.toggle_pause(true);
        worker.end(false);
        assert!(worker.is_paused());
        assert!(worker.is_ended());
        assert_eq!(
            worker.events(),
            vec![WorkerEvent::TogglePause(true), WorkerEvent::End(false)]
        );
    }
}
