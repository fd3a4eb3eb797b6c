//! store::memory
//!
//! In-process store for tests and single-host use.
//!
//! # Design
//!
//! `MemoryStore` implements [`ScriptStore`] without a server. It cannot run
//! Lua, so it recognises the two lock scripts by their source and executes
//! their semantics natively under one mutex, which gives the same atomicity
//! a Redis server gives a script. Any other script is rejected at load time.
//!
//! Expiry uses `tokio::time::Instant`, so tests with a paused clock control
//! TTLs precisely. Expired keys are purged lazily on the next script run.
//!
//! Like a mock, it records operations and can be told to fail. The
//! operation and publish logs keep only the latest [`LOG_CAPACITY`]
//! entries, so a long-lived store stays bounded.
//!
//! # Example
//!
//! ```
//! use relock::core::types::LockKey;
//! use relock::lock::{LockClient, LockOptions};
//! use relock::store::memory::MemoryStore;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let client = LockClient::with_store(store.clone());
//! let key = LockKey::new("orders").unwrap();
//!
//! let lock = client
//!     .try_lock(&key, Duration::ZERO, Duration::from_secs(30), LockOptions::new())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(store.hold_count("orders", lock.owner().as_str()), Some(1));
//! # });
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::time::{sleep, Instant};

use super::traits::{Reply, ScriptHandle, ScriptStore, StoreError};
use crate::lock::scripts::{ACQUIRE_SCRIPT, RELEASE_SCRIPT};

/// Entries kept in each of the operation and publish logs.
pub const LOG_CAPACITY: usize = 4096;

/// In-memory store.
///
/// Thread-safe via internal `Arc<Mutex<...>>`; clones share state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    /// Lock keys: owner field → hold count, plus expiry.
    keys: HashMap<String, Entry>,
    /// Loaded scripts by handle.
    scripts: HashMap<String, ScriptKind>,
    /// Every message published, in order.
    published: VecDeque<Published>,
    /// Operation to fail on.
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: VecDeque<MockOperation>,
    /// Delay applied before each eval.
    latency: Duration,
}

#[derive(Debug, Default)]
struct Entry {
    fields: HashMap<String, i64>,
    expires_at: Option<Instant>,
}

impl Entry {
    /// Remaining TTL in ms, `PTTL` style (-1 when no expiry).
    fn pttl(&self, now: Instant) -> i64 {
        match self.expires_at {
            Some(at) => {
                i64::try_from(at.saturating_duration_since(now).as_millis()).unwrap_or(i64::MAX)
            }
            None => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptKind {
    Acquire,
    Release,
}

impl ScriptKind {
    fn from_source(source: &str) -> Option<Self> {
        if source == ACQUIRE_SCRIPT.source() {
            Some(ScriptKind::Acquire)
        } else if source == RELEASE_SCRIPT.source() {
            Some(ScriptKind::Release)
        } else {
            None
        }
    }

    fn name(self) -> &'static str {
        match self {
            ScriptKind::Acquire => ACQUIRE_SCRIPT.name(),
            ScriptKind::Release => RELEASE_SCRIPT.name(),
        }
    }
}

/// A message published on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub channel: String,
    pub payload: String,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail load_script with the given error.
    LoadScript(StoreError),
    /// Fail eval with the given error.
    Eval(StoreError),
    /// Fail publish with the given error.
    Publish(StoreError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    LoadScript {
        handle: String,
    },
    Eval {
        script: &'static str,
        keys: Vec<String>,
        args: Vec<String>,
    },
    Publish {
        channel: String,
        payload: String,
    },
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner::default())),
        }
    }

    /// Delay every eval by `latency` (simulates a slow round trip).
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock_inner().latency = latency;
        self
    }

    /// Configure the store to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock_inner().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock_inner().fail_on = None;
    }

    /// Recorded operations, oldest first.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock_inner().operations.iter().cloned().collect()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.lock_inner().operations.clear();
    }

    /// Forget every loaded script, like `SCRIPT FLUSH`.
    pub fn flush_scripts(&self) {
        self.lock_inner().scripts.clear();
    }

    /// Number of loaded scripts.
    pub fn script_count(&self) -> usize {
        self.lock_inner().scripts.len()
    }

    /// Messages published so far, oldest first.
    pub fn published(&self) -> Vec<Published> {
        self.lock_inner().published.iter().cloned().collect()
    }

    /// Whether `key` currently exists (not expired).
    pub fn exists(&self, key: &str) -> bool {
        let mut inner = self.lock_inner();
        inner.purge_expired(Instant::now());
        inner.keys.contains_key(key)
    }

    /// Hold count of `owner` on `key`, if any.
    pub fn hold_count(&self, key: &str, owner: &str) -> Option<i64> {
        let mut inner = self.lock_inner();
        inner.purge_expired(Instant::now());
        inner
            .keys
            .get(key)
            .and_then(|entry| entry.fields.get(owner).copied())
    }

    /// Number of owner fields on `key`.
    pub fn field_count(&self, key: &str) -> usize {
        let mut inner = self.lock_inner();
        inner.purge_expired(Instant::now());
        inner.keys.get(key).map_or(0, |entry| entry.fields.len())
    }

    /// Remaining expiry of `key`.
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let mut inner = self.lock_inner();
        inner.purge_expired(now);
        inner
            .keys
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Set `owner`'s count on `key` directly, as another process would.
    pub fn seed_hold(&self, key: &str, owner: &str, count: i64, ttl: Duration) {
        let mut inner = self.lock_inner();
        let entry = inner.keys.entry(key.to_string()).or_default();
        entry.fields.insert(owner.to_string(), count);
        entry.expires_at = Instant::now().checked_add(ttl);
    }

    /// Delete `key` regardless of holders.
    pub fn clear_hold(&self, key: &str) {
        self.lock_inner().keys.remove(key);
    }

    fn lock_inner(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn record(&mut self, op: MockOperation) {
        push_bounded(&mut self.operations, op);
    }

    fn publish_message(&mut self, message: Published) {
        push_bounded(&mut self.published, message);
    }

    fn check_fail(&self, expected: &str) -> Result<(), StoreError> {
        match &self.fail_on {
            Some(FailOn::LoadScript(e)) if expected == "load_script" => Err(e.clone()),
            Some(FailOn::Eval(e)) if expected == "eval" => Err(e.clone()),
            Some(FailOn::Publish(e)) if expected == "publish" => Err(e.clone()),
            _ => Ok(()),
        }
    }

    fn purge_expired(&mut self, now: Instant) {
        self.keys
            .retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
    }

    fn run_acquire(
        &mut self,
        keys: &[String],
        args: &[String],
        now: Instant,
    ) -> Result<Reply, StoreError> {
        let key = arg(keys, 0, "KEYS")?;
        let ttl = parse_millis(arg(args, 0, "ARGV")?)?;
        let owner = arg(args, 1, "ARGV")?;

        match self.keys.get_mut(key) {
            None => {
                let mut entry = Entry::default();
                entry.fields.insert(owner.to_string(), 1);
                entry.expires_at = now.checked_add(ttl);
                self.keys.insert(key.to_string(), entry);
                Ok(Reply::Nil)
            }
            Some(entry) => match entry.fields.get_mut(owner) {
                Some(count) => {
                    *count += 1;
                    entry.expires_at = now.checked_add(ttl);
                    Ok(Reply::Nil)
                }
                None => Ok(Reply::Int(entry.pttl(now))),
            },
        }
    }

    fn run_release(
        &mut self,
        keys: &[String],
        args: &[String],
        now: Instant,
    ) -> Result<Reply, StoreError> {
        let key = arg(keys, 0, "KEYS")?;
        let channel = arg(keys, 1, "KEYS")?;
        let message = arg(args, 0, "ARGV")?;
        let ttl = parse_millis(arg(args, 1, "ARGV")?)?;
        let owner = arg(args, 2, "ARGV")?;

        let Some(entry) = self.keys.get_mut(key) else {
            return Ok(Reply::Nil);
        };
        let Some(count) = entry.fields.get_mut(owner) else {
            return Ok(Reply::Nil);
        };

        *count -= 1;
        if *count > 0 {
            entry.expires_at = now.checked_add(ttl);
            return Ok(Reply::Int(0));
        }

        self.keys.remove(key);
        self.publish_message(Published {
            channel: channel.to_string(),
            payload: message.to_string(),
        });
        Ok(Reply::Int(1))
    }
}

fn push_bounded<T>(log: &mut VecDeque<T>, item: T) {
    if log.len() == LOG_CAPACITY {
        log.pop_front();
    }
    log.push_back(item);
}

fn arg<'a>(values: &'a [String], index: usize, what: &str) -> Result<&'a str, StoreError> {
    values.get(index).map(String::as_str).ok_or_else(|| {
        StoreError::Script(format!("missing {}[{}]", what, index + 1))
    })
}

fn parse_millis(value: &str) -> Result<Duration, StoreError> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| StoreError::Script("ERR value is not an integer or out of range".into()))
}

#[async_trait]
impl ScriptStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load_script(&self, source: &str) -> Result<ScriptHandle, StoreError> {
        let handle = hex::encode(Sha256::digest(source.as_bytes()));
        let mut inner = self.lock_inner();
        inner.record(MockOperation::LoadScript {
            handle: handle.clone(),
        });
        inner.check_fail("load_script")?;

        let kind = ScriptKind::from_source(source).ok_or_else(|| {
            StoreError::UnsupportedScript("memory store only runs the lock scripts".into())
        })?;
        inner.scripts.insert(handle.clone(), kind);
        Ok(ScriptHandle::new(handle))
    }

    async fn eval(
        &self,
        handle: &ScriptHandle,
        keys: &[String],
        args: &[String],
    ) -> Result<Reply, StoreError> {
        let latency = self.lock_inner().latency;
        if !latency.is_zero() {
            sleep(latency).await;
        }

        let mut inner = self.lock_inner();
        let kind = inner.scripts.get(handle.as_str()).copied();
        inner.record(MockOperation::Eval {
            script: kind.map_or("unknown", ScriptKind::name),
            keys: keys.to_vec(),
            args: args.to_vec(),
        });
        inner.check_fail("eval")?;

        let kind = kind.ok_or_else(|| {
            StoreError::NoScript(format!("no matching script for handle {}", handle))
        })?;
        let now = Instant::now();
        inner.purge_expired(now);
        match kind {
            ScriptKind::Acquire => inner.run_acquire(keys, args, now),
            ScriptKind::Release => inner.run_release(keys, args, now),
        }
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<u64, StoreError> {
        let mut inner = self.lock_inner();
        inner.record(MockOperation::Publish {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        inner.check_fail("publish")?;

        inner.publish_message(Published {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loaded(store: &MemoryStore) -> (ScriptHandle, ScriptHandle) {
        let acquire = store.load_script(ACQUIRE_SCRIPT.source()).await.unwrap();
        let release = store.load_script(RELEASE_SCRIPT.source()).await.unwrap();
        (acquire, release)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn unknown_script_is_rejected() {
        let store = MemoryStore::new();
        let result = store.load_script("return redis.call('ping')").await;
        assert!(matches!(result, Err(StoreError::UnsupportedScript(_))));
    }

    #[tokio::test]
    async fn handles_are_stable_per_source() {
        let store = MemoryStore::new();
        let (a1, r1) = loaded(&store).await;
        let (a2, _) = loaded(&store).await;
        assert_eq!(a1, a2);
        assert_ne!(a1, r1);
        assert_eq!(a1.as_str().len(), 64);
    }

    #[tokio::test]
    async fn eval_unknown_handle_is_noscript() {
        let store = MemoryStore::new();
        let result = store
            .eval(&ScriptHandle::new("deadbeef"), &strings(&["k"]), &[])
            .await;
        assert!(matches!(result, Err(StoreError::NoScript(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_reports_pttl_when_contended() {
        let store = MemoryStore::new();
        let (acquire, _) = loaded(&store).await;
        let keys = strings(&["k"]);

        let first = store
            .eval(&acquire, &keys, &strings(&["10000", "a"]))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(2_500)).await;
        let second = store
            .eval(&acquire, &keys, &strings(&["10000", "b"]))
            .await
            .unwrap();

        assert_eq!(first, Reply::Nil);
        assert_eq!(second, Reply::Int(7_500));
        assert_eq!(store.hold_count("k", "b"), None);
    }

    #[tokio::test]
    async fn release_decrements_then_deletes() {
        let store = MemoryStore::new();
        let (acquire, release) = loaded(&store).await;
        let keys = strings(&["k"]);
        let release_keys = strings(&["k", "chan"]);
        let release_args = strings(&["0", "10000", "a"]);

        store
            .eval(&acquire, &keys, &strings(&["10000", "a"]))
            .await
            .unwrap();
        store
            .eval(&acquire, &keys, &strings(&["10000", "a"]))
            .await
            .unwrap();

        let r1 = store.eval(&release, &release_keys, &release_args).await.unwrap();
        let r2 = store.eval(&release, &release_keys, &release_args).await.unwrap();
        let r3 = store.eval(&release, &release_keys, &release_args).await.unwrap();

        assert_eq!((r1, r2, r3), (Reply::Int(0), Reply::Int(1), Reply::Nil));
        assert!(!store.exists("k"));
        assert_eq!(
            store.published(),
            vec![Published {
                channel: "chan".into(),
                payload: "0".into()
            }]
        );
    }

    #[tokio::test]
    async fn bad_ttl_argument_is_script_error() {
        let store = MemoryStore::new();
        let (acquire, _) = loaded(&store).await;
        let result = store
            .eval(&acquire, &strings(&["k"]), &strings(&["soon", "a"]))
            .await;
        assert!(matches!(result, Err(StoreError::Script(_))));
    }

    #[tokio::test]
    async fn missing_arguments_are_script_errors() {
        let store = MemoryStore::new();
        let (_, release) = loaded(&store).await;
        let result = store
            .eval(&release, &strings(&["k"]), &strings(&["0", "1000", "a"]))
            .await;
        assert_eq!(result, Err(StoreError::Script("missing KEYS[2]".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire() {
        let store = MemoryStore::new();
        store.seed_hold("k", "a", 3, Duration::from_millis(100));
        assert!(store.exists("k"));

        tokio::time::advance(Duration::from_millis(100)).await;

        assert!(!store.exists("k"));
        assert_eq!(store.hold_count("k", "a"), None);
    }

    #[tokio::test]
    async fn publish_records_message() {
        let store = MemoryStore::new();
        assert_eq!(store.publish("c", "1").await.unwrap(), 0);
        assert_eq!(store.published().len(), 1);
        assert!(matches!(
            store.operations()[0],
            MockOperation::Publish { .. }
        ));
    }

    #[tokio::test]
    async fn fail_on_publish() {
        let store = MemoryStore::new().fail_on(FailOn::Publish(StoreError::Timeout(10)));
        assert_eq!(store.publish("c", "1").await, Err(StoreError::Timeout(10)));
        assert!(store.published().is_empty());

        store.clear_fail_on();
        assert!(store.publish("c", "1").await.is_ok());
    }

    #[tokio::test]
    async fn logs_keep_only_the_latest_entries() {
        let store = MemoryStore::new();
        for i in 0..LOG_CAPACITY + 10 {
            store.publish("c", &i.to_string()).await.unwrap();
        }

        let published = store.published();
        assert_eq!(published.len(), LOG_CAPACITY);
        assert_eq!(published[0].payload, "10");
        assert_eq!(store.operations().len(), LOG_CAPACITY);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_ttl_never_expires() {
        let store = MemoryStore::new();
        store.seed_hold("k", "a", 1, Duration::MAX);

        tokio::time::advance(Duration::from_secs(86_400)).await;

        assert_eq!(store.hold_count("k", "a"), Some(1));
        assert_eq!(store.remaining_ttl("k"), None);
    }

    #[test]
    fn store_name() {
        assert_eq!(MemoryStore::new().name(), "memory");
    }
}
