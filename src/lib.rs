//! relock - reentrant distributed locks on Redis-compatible stores
//!
//! A lock is a hash at the lock key mapping an owner token to a hold count,
//! with a key expiry acting as a lease. Acquire and release are server-side
//! scripts, so each check-and-update is atomic. A full release publishes an
//! unlock message on a channel derived from the key.
//!
//! # Architecture
//!
//! - [`core`] - Validated types, channel naming, configuration
//! - [`store`] - The `ScriptStore` capability (Redis, in-memory) and script cache
//! - [`lock`] - Acquisition loop, retry strategies, lock handles
//! - [`cli`] - The `relock` command-line interface
//!
//! # Correctness Invariants
//!
//! 1. At most one owner holds a positive count on a key at any time
//! 2. A key exists only while some owner's count is positive
//! 3. A waiter never sleeps past its deadline
//! 4. Store failures are reported, never retried as contention
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
//! let key = LockKey::new("invoices").unwrap();
//!
//! let lock = client
//!     .try_lock(&key, Duration::from_secs(1), Duration::from_secs(30), LockOptions::new())
//!     .await
//!     .unwrap();
//! // ... critical section ...
//! assert_eq!(lock.unlock().await.unwrap(), ReleaseOutcome::Released);
//! # });
//! ```

pub mod cli;
pub mod core;
pub mod lock;
pub mod store;
