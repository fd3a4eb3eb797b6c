//! lock
//!
//! Reentrant distributed lock protocol.
//!
//! # Architecture
//!
//! - [`client`]: `LockClient`, the coordinator running the acquire/retry loop
//! - [`handle`]: `Lock`, returned on success, released with `unlock`
//! - [`scripts`]: the atomic acquire/release scripts and reply decoding
//! - [`retry`]: backoff strategies (linear, exponential, limited)
//! - [`options`]: per-call options
//!
//! # Invariants
//!
//! - A key's hash has a positive count for at most one owner at a time
//! - A key exists only while some owner's count is positive
//! - Existence check, count change and expiry update happen in one script
//! - Only contention is retried; store errors abort the call

pub mod client;
mod errors;
pub mod handle;
mod options;
pub mod retry;
pub mod scripts;

pub use client::LockClient;
pub use errors::LockError;
pub use handle::{unlock_opt, Lock};
pub use options::LockOptions;
pub use scripts::ReleaseOutcome;
