//! core::channel
//!
//! Release notification channel naming and message codes.
//!
//! A full release publishes [`UNLOCK_MESSAGE`] on the channel returned by
//! [`channel_name`]. Publisher and subscribers must derive the name the same
//! way, so this is the only place it is built.
//!
//! Acquisition never subscribes to the channel; waiting is poll-based. The
//! channel exists for external consumers that want to observe releases.
//!
//! # Example
//!
//! ```
//! use relock::core::channel::channel_name;
//! use relock::core::types::LockKey;
//!
//! let key = LockKey::new("job:42").unwrap();
//! assert_eq!(channel_name(&key), "redisson_lock__channel:{job:42}");
//! ```

use super::types::LockKey;

/// Fixed prefix of every notification channel.
pub const CHANNEL_PREFIX: &str = "redisson_lock__channel";

/// Published when the last hold on a key is released.
pub const UNLOCK_MESSAGE: i64 = 0;

/// Reserved for read-lock releases. Not emitted by the release script.
pub const READ_UNLOCK_MESSAGE: i64 = 1;

/// Notification channel for `key`: `<prefix>:{<key>}`.
pub fn channel_name(key: &LockKey) -> String {
    format!("{}:{{{}}}", CHANNEL_PREFIX, key.as_str())
}
