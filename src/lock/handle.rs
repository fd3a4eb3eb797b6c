//! lock::handle
//!
//! A successfully acquired lock.
//!
//! # Release
//!
//! [`Lock::unlock`] runs the release script once. Each call undoes one
//! acquisition by this owner, so a lock acquired N times reentrantly needs N
//! releases before the key disappears. Releasing more often than acquired is
//! harmless: the script reports `NotHeld` and changes nothing.
//!
//! Dropping a `Lock` does not release it; the key then lives until its TTL
//! runs out. Release is a network round trip and must not be skipped just
//! because the acquiring task was cancelled. [`Lock::unlock_detached`] runs
//! it on its own task for that case.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::channel::channel_name;
use crate::core::types::{ttl_millis, LockKey, OwnerToken};

use super::client::ClientShared;
use super::scripts::{self, ReleaseOutcome, RELEASE_SCRIPT};
use super::LockError;

/// An acquired lock on one key, held by one owner.
///
/// Not meant for concurrent `unlock` calls from several tasks; each call is
/// one decrement.
pub struct Lock {
    shared: Arc<ClientShared>,
    key: LockKey,
    owner: OwnerToken,
    ttl: Duration,
    wait_time: Duration,
}

impl Lock {
    pub(crate) fn new(
        shared: Arc<ClientShared>,
        key: LockKey,
        owner: OwnerToken,
        ttl: Duration,
        wait_time: Duration,
    ) -> Self {
        Self {
            shared,
            key,
            owner,
            ttl,
            wait_time,
        }
    }

    /// The locked key.
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// The owner token; pass it to `try_lock_as` for nested acquisitions.
    pub fn owner(&self) -> &OwnerToken {
        &self.owner
    }

    /// TTL applied on acquisition and refreshed by partial releases.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Wait budget the lock was acquired with.
    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    /// Channel the full release publishes on.
    pub fn channel(&self) -> String {
        channel_name(&self.key)
    }

    /// Undo one acquisition by this owner.
    ///
    /// # Returns
    ///
    /// - `StillHeld` if the owner still holds the key (count > 0, TTL refreshed)
    /// - `Released` if the key was deleted and the unlock message published
    /// - `NotHeld` if the owner held nothing (already released or expired)
    ///
    /// # Errors
    ///
    /// Store failures and unexpected script replies.
    pub async fn unlock(&self) -> Result<ReleaseOutcome, LockError> {
        let ttl_ms = ttl_millis(self.ttl)?;
        let reply = self
            .shared
            .scripts
            .evaluate(
                self.shared.store.as_ref(),
                &RELEASE_SCRIPT,
                &scripts::release_keys(&self.key),
                &scripts::release_args(ttl_ms, &self.owner),
            )
            .await?;
        let outcome = scripts::decode_release(reply)?;

        match outcome {
            ReleaseOutcome::Released => {
                info!(key = %self.key, owner = %self.owner, "lock released")
            }
            ReleaseOutcome::StillHeld => {
                debug!(key = %self.key, owner = %self.owner, "reentrant hold released")
            }
            ReleaseOutcome::NotHeld => {
                debug!(key = %self.key, owner = %self.owner, "lock was not held")
            }
        }
        Ok(outcome)
    }

    /// Release on a spawned task so that dropping the caller cannot abort it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn unlock_detached(self) -> JoinHandle<Result<ReleaseOutcome, LockError>> {
        tokio::spawn(async move { self.unlock().await })
    }
}

/// Release `lock` if there is one; `None` is a no-op reporting `NotHeld`.
///
/// Fits cleanup paths where the acquisition may not have happened:
///
/// ```
/// use relock::core::types::LockKey;
/// use relock::lock::{unlock_opt, LockClient, LockOptions, ReleaseOutcome};
/// use relock::store::memory::MemoryStore;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let client = LockClient::with_store(MemoryStore::new());
/// let key = LockKey::new("maybe").unwrap();
/// let lock = client
///     .try_lock(&key, Duration::ZERO, Duration::from_secs(5), LockOptions::new())
///     .await
///     .ok();
///
/// assert_eq!(unlock_opt(lock.as_ref()).await.unwrap(), ReleaseOutcome::Released);
/// assert_eq!(unlock_opt(None).await.unwrap(), ReleaseOutcome::NotHeld);
/// # });
/// ```
pub async fn unlock_opt(lock: Option<&Lock>) -> Result<ReleaseOutcome, LockError> {
    match lock {
        Some(lock) => lock.unlock().await,
        None => Ok(ReleaseOutcome::NotHeld),
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.key)
            .field("owner", &self.owner)
            .field("ttl", &self.ttl)
            .field("wait_time", &self.wait_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::UNLOCK_MESSAGE;
    use crate::lock::{LockClient, LockOptions};
    use crate::store::memory::{FailOn, MemoryStore};
    use crate::store::StoreError;

    const TTL: Duration = Duration::from_secs(10);

    async fn acquire(client: &LockClient, key: &str) -> Lock {
        client
            .try_lock(
                &LockKey::new(key).unwrap(),
                Duration::ZERO,
                TTL,
                LockOptions::new(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn full_release_deletes_and_publishes() {
        let store = MemoryStore::new();
        let client = LockClient::with_store(store.clone());
        let lock = acquire(&client, "job:42").await;

        assert_eq!(lock.unlock().await.unwrap(), ReleaseOutcome::Released);

        assert!(!store.exists("job:42"));
        let published = store.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].channel, "redisson_lock__channel:{job:42}");
        assert_eq!(published[0].payload, UNLOCK_MESSAGE.to_string());
    }

    #[tokio::test]
    async fn second_unlock_is_noop() {
        let store = MemoryStore::new();
        let client = LockClient::with_store(store.clone());
        let lock = acquire(&client, "once").await;

        lock.unlock().await.unwrap();
        assert_eq!(lock.unlock().await.unwrap(), ReleaseOutcome::NotHeld);
        assert_eq!(store.published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_release_refreshes_ttl() {
        let store = MemoryStore::new();
        let client = LockClient::with_store(store.clone());
        let outer = acquire(&client, "nested").await;
        let _inner = client
            .try_lock_as(
                outer.owner(),
                outer.key(),
                Duration::ZERO,
                TTL,
                LockOptions::new(),
            )
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(outer.unlock().await.unwrap(), ReleaseOutcome::StillHeld);

        assert_eq!(store.hold_count("nested", outer.owner().as_str()), Some(1));
        assert_eq!(store.remaining_ttl("nested"), Some(TTL));
        assert!(store.published().is_empty());
    }

    #[tokio::test]
    async fn other_owner_cannot_release() {
        let store = MemoryStore::new();
        let client = LockClient::with_store(store.clone());
        let lock = acquire(&client, "mine").await;
        store.clear_hold("mine");
        store.seed_hold("mine", "someone-else", 1, TTL);

        assert_eq!(lock.unlock().await.unwrap(), ReleaseOutcome::NotHeld);
        assert_eq!(store.hold_count("mine", "someone-else"), Some(1));
    }

    #[tokio::test]
    async fn store_failure_surfaces() {
        let store = MemoryStore::new();
        let client = LockClient::with_store(store.clone());
        let lock = acquire(&client, "flaky").await;
        let store = store.fail_on(FailOn::Eval(StoreError::Timeout(100)));

        assert_eq!(
            lock.unlock().await.unwrap_err(),
            LockError::Store(StoreError::Timeout(100))
        );
        assert!(store.exists("flaky"));
    }

    #[tokio::test]
    async fn detached_unlock_completes() {
        let store = MemoryStore::new();
        let client = LockClient::with_store(store.clone());
        let lock = acquire(&client, "detached").await;

        let outcome = lock.unlock_detached().await.unwrap().unwrap();

        assert_eq!(outcome, ReleaseOutcome::Released);
        assert!(!store.exists("detached"));
    }

    #[tokio::test]
    async fn missing_lock_unlocks_as_noop() {
        let store = MemoryStore::new();

        assert_eq!(unlock_opt(None).await.unwrap(), ReleaseOutcome::NotHeld);
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn present_lock_unlocks_through_option() {
        let store = MemoryStore::new();
        let client = LockClient::with_store(store.clone());
        let lock = Some(acquire(&client, "opt").await);

        assert_eq!(
            unlock_opt(lock.as_ref()).await.unwrap(),
            ReleaseOutcome::Released
        );
        assert!(!store.exists("opt"));
    }

    #[tokio::test]
    async fn accessors() {
        let client = LockClient::with_store(MemoryStore::new());
        let lock = acquire(&client, "acc").await;

        assert_eq!(lock.key().as_str(), "acc");
        assert_eq!(lock.ttl(), TTL);
        assert_eq!(lock.wait_time(), Duration::ZERO);
        assert_eq!(lock.channel(), "redisson_lock__channel:{acc}");
        assert!(format!("{:?}", lock).contains("acc"));
    }
}
