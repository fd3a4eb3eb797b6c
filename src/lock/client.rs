//! lock::client
//!
//! The lock coordinator: owner identity, deadline and retry loop.
//!
//! # Acquisition
//!
//! 1. Pick the owner token: a fresh UUID for [`LockClient::try_lock`], the
//!    caller's token for [`LockClient::try_lock_as`].
//! 2. Fix the deadline at `now + wait_time`. A budget too large to add to
//!    the clock (e.g. `Duration::MAX`) means no deadline at all.
//! 3. Run the acquire script. Store errors abort the call; success returns a
//!    [`Lock`]; contention asks the retry strategy for a backoff.
//! 4. No backoff means `NotObtained`. Otherwise sleep for the backoff, unless
//!    the deadline comes first, in which case sleep until the deadline and
//!    return `NotObtained`.
//!
//! There are no background tasks. The only suspension points are the script
//! round trip and the backoff sleep. Both race the cancellation signal and
//! the deadline; a round trip still in flight at the deadline is abandoned
//! with `NotObtained`. A zero budget is a single attempt, so its one round
//! trip is bounded by the store's response timeout instead.
//!
//! # Reentrancy
//!
//! Ownership is explicit. A nested acquisition passes the outer lock's
//! [`Lock::owner`] to `try_lock_as`, and the store increments that owner's
//! hold count instead of contending.
//!
//! # Example
//!
//! ```
//! use relock::core::types::LockKey;
//! use relock::lock::{LockClient, LockOptions, ReleaseOutcome};
//! use relock::store::memory::MemoryStore;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let client = LockClient::with_store(MemoryStore::new());
//! let key = LockKey::new("job:42").unwrap();
//!
//! let outer = client
//!     .try_lock(&key, Duration::from_secs(5), Duration::from_secs(10), LockOptions::new())
//!     .await
//!     .unwrap();
//! let inner = client
//!     .try_lock_as(outer.owner(), &key, Duration::ZERO, Duration::from_secs(10), LockOptions::new())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(inner.unlock().await.unwrap(), ReleaseOutcome::StillHeld);
//! assert_eq!(outer.unlock().await.unwrap(), ReleaseOutcome::Released);
//! # });
//! ```

use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info};

use crate::core::channel::{channel_name, UNLOCK_MESSAGE};
use crate::core::types::{ttl_millis, LockKey, OwnerToken};
use crate::store::{create_store, ScriptCache, ScriptStore, StoreSettings};

use super::handle::Lock;
use super::options::LockOptions;
use super::scripts::{self, AcquireReply, ACQUIRE_SCRIPT, RELEASE_SCRIPT};
use super::LockError;

/// State shared by a client and every lock it hands out.
pub(crate) struct ClientShared {
    pub(crate) store: Arc<dyn ScriptStore>,
    pub(crate) scripts: ScriptCache,
}

/// Entry point for acquiring locks against one store.
///
/// Cheap to clone; clones share the store connection and script cache.
#[derive(Clone)]
pub struct LockClient {
    shared: Arc<ClientShared>,
}

impl std::fmt::Debug for LockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockClient")
            .field("store", &self.shared.store.name())
            .finish()
    }
}

impl LockClient {
    /// Create a client over a shared store.
    pub fn new(store: Arc<dyn ScriptStore>) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                store,
                scripts: ScriptCache::new(),
            }),
        }
    }

    /// Create a client that owns `store`.
    pub fn with_store(store: impl ScriptStore + 'static) -> Self {
        Self::new(Arc::new(store))
    }

    /// Connect to the store at `url` (see [`create_store`]).
    ///
    /// # Errors
    ///
    /// Returns the store error if the URL is unsupported or the connection
    /// cannot be established.
    pub async fn connect(url: &str, settings: &StoreSettings) -> Result<Self, LockError> {
        let store = create_store(url, settings).await?;
        Ok(Self::new(store))
    }

    /// Name of the underlying store.
    pub fn store_name(&self) -> &'static str {
        self.shared.store.name()
    }

    /// Load both lock scripts now instead of on first use.
    pub async fn preload(&self) -> Result<(), LockError> {
        self.shared
            .scripts
            .preload(self.shared.store.as_ref(), &[ACQUIRE_SCRIPT, RELEASE_SCRIPT])
            .await?;
        Ok(())
    }

    /// Handle for a lock `owner` acquired elsewhere, e.g. in another process.
    ///
    /// No round trip; `unlock` reports `NotHeld` if `owner` holds nothing.
    pub fn adopt(&self, key: LockKey, owner: OwnerToken, ttl: Duration) -> Lock {
        Lock::new(Arc::clone(&self.shared), key, owner, ttl, Duration::ZERO)
    }

    /// Publish the unlock message on `key`'s channel without touching the key.
    ///
    /// Subscribers see the same message a full release sends. Useful after a
    /// holder died and its lease ran out, since expiry publishes nothing.
    /// Returns the number of subscribers that received it.
    pub async fn notify(&self, key: &LockKey) -> Result<u64, LockError> {
        let channel = channel_name(key);
        let receivers = self
            .shared
            .store
            .publish(&channel, &UNLOCK_MESSAGE.to_string())
            .await?;
        debug!(key = %key, channel = %channel, receivers, "unlock notification sent");
        Ok(receivers)
    }

    /// Try to acquire `key` as a new owner within `wait_time`, holding it for
    /// up to `ttl`.
    ///
    /// # Errors
    ///
    /// - `NotObtained` if the key stays held by another owner
    /// - `Store` if any round trip fails
    /// - `Invalid` if `ttl` is below one millisecond
    pub async fn try_lock(
        &self,
        key: &LockKey,
        wait_time: Duration,
        ttl: Duration,
        opts: LockOptions,
    ) -> Result<Lock, LockError> {
        self.acquire(
            OwnerToken::generate(),
            key,
            wait_time,
            ttl,
            opts,
            future::pending(),
        )
        .await
    }

    /// Try to acquire `key` as an existing owner.
    ///
    /// If `owner` already holds the key this succeeds immediately and bumps
    /// the hold count; each such lock needs its own `unlock`.
    pub async fn try_lock_as(
        &self,
        owner: &OwnerToken,
        key: &LockKey,
        wait_time: Duration,
        ttl: Duration,
        opts: LockOptions,
    ) -> Result<Lock, LockError> {
        self.acquire(
            owner.clone(),
            key,
            wait_time,
            ttl,
            opts,
            future::pending(),
        )
        .await
    }

    /// Like [`try_lock_as`](Self::try_lock_as) (or `try_lock` when `owner`
    /// is `None`), but gives up with `NotObtained` as soon as `cancel`
    /// completes, even mid round trip.
    pub async fn try_lock_cancellable<F>(
        &self,
        owner: Option<&OwnerToken>,
        key: &LockKey,
        wait_time: Duration,
        ttl: Duration,
        opts: LockOptions,
        cancel: F,
    ) -> Result<Lock, LockError>
    where
        F: Future<Output = ()>,
    {
        let owner = owner.cloned().unwrap_or_else(OwnerToken::generate);
        self.acquire(owner, key, wait_time, ttl, opts, cancel).await
    }

    async fn acquire<F>(
        &self,
        owner: OwnerToken,
        key: &LockKey,
        wait_time: Duration,
        ttl: Duration,
        opts: LockOptions,
        cancel: F,
    ) -> Result<Lock, LockError>
    where
        F: Future<Output = ()>,
    {
        let ttl_ms = ttl_millis(ttl)?;
        let mut retry = opts.into_retry_strategy();
        let deadline = Instant::now().checked_add(wait_time);
        let round_trip_deadline = if wait_time.is_zero() {
            None
        } else {
            deadline
        };
        let keys = scripts::acquire_keys(key);
        let args = scripts::acquire_args(ttl_ms, &owner);
        tokio::pin!(cancel);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let reply = tokio::select! {
                biased;
                _ = &mut cancel => {
                    debug!(key = %key, attempt, "acquisition cancelled");
                    return Err(LockError::NotObtained);
                }
                reply = self.shared.scripts.evaluate(
                    self.shared.store.as_ref(),
                    &ACQUIRE_SCRIPT,
                    &keys,
                    &args,
                ) => reply?,
                _ = until(round_trip_deadline) => {
                    debug!(key = %key, attempt, "wait budget exhausted mid round trip");
                    return Err(LockError::NotObtained);
                }
            };

            let remaining_ttl = match scripts::decode_acquire(reply)? {
                AcquireReply::Acquired => {
                    info!(key = %key, owner = %owner, attempt, ttl_ms, "lock acquired");
                    return Ok(Lock::new(
                        Arc::clone(&self.shared),
                        key.clone(),
                        owner,
                        ttl,
                        wait_time,
                    ));
                }
                AcquireReply::Contended { remaining_ttl } => remaining_ttl,
            };
            debug!(
                key = %key,
                attempt,
                remaining_ttl_ms = ?remaining_ttl.map(|d| d.as_millis()),
                "lock held by another owner"
            );

            let Some(backoff) = retry.next_backoff() else {
                debug!(key = %key, attempt, "retry strategy exhausted");
                return Err(LockError::NotObtained);
            };

            let clipped =
                deadline.filter(|at| at.saturating_duration_since(Instant::now()) <= backoff);
            if let Some(at) = clipped {
                tokio::select! {
                    biased;
                    _ = &mut cancel => {}
                    _ = sleep_until(at) => {}
                }
                debug!(key = %key, attempt, "wait budget exhausted");
                return Err(LockError::NotObtained);
            }

            tokio::select! {
                biased;
                _ = &mut cancel => {
                    debug!(key = %key, attempt, "acquisition cancelled");
                    return Err(LockError::NotObtained);
                }
                _ = sleep(backoff) => {}
            }
        }
    }
}

/// Completes at `deadline`, or never when there is none.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => future::pending().await,
    }
}
