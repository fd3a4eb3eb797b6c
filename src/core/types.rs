//! core::types
//!
//! Strong types for lock domain concepts.
//!
//! # Types
//!
//! - [`LockKey`] - Name of the shared resource in the store's key space
//! - [`OwnerToken`] - Identity of one acquirer (the hash field holding its count)
//!
//! # Validation
//!
//! These types enforce validity at construction time, so the scripts never
//! see an empty key or owner field.
//!
//! # Examples
//!
//! ```
//! use relock::core::types::{LockKey, OwnerToken};
//!
//! let key = LockKey::new("job:42").unwrap();
//! let owner = OwnerToken::generate();
//! assert_eq!(key.as_str(), "job:42");
//! assert!(!owner.as_str().is_empty());
//!
//! assert!(LockKey::new("").is_err());
//! assert!(OwnerToken::new("has space").is_err());
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid lock key: {0}")]
    InvalidKey(String),

    #[error("invalid owner token: {0}")]
    InvalidOwner(String),

    #[error("invalid ttl: {0}")]
    InvalidTtl(String),
}

/// A validated lock key.
///
/// Any non-empty string without ASCII control characters is accepted.
/// Redis keys are binary safe, but control characters make the channel
/// name and CLI output ambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LockKey(String);

impl LockKey {
    /// Create a new validated lock key.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidKey` if the key is empty or contains
    /// control characters.
    pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into();
        if key.is_empty() {
            return Err(TypeError::InvalidKey("lock key cannot be empty".into()));
        }
        if key.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidKey(format!(
                "lock key '{}' contains control characters",
                key.escape_debug()
            )));
        }
        Ok(Self(key))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LockKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for LockKey {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LockKey> for String {
    fn from(key: LockKey) -> Self {
        key.0
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of a lock owner.
///
/// The token is the hash field under which the store keeps the owner's hold
/// count. Reusing a token for a nested acquisition is what makes the lock
/// reentrant; a fresh token always contends with every other owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Create an owner token from an existing string (e.g. one printed by
    /// `relock acquire` in another process).
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOwner` if the token is empty or contains
    /// whitespace or control characters.
    pub fn new(token: impl Into<String>) -> Result<Self, TypeError> {
        let token = token.into();
        if token.is_empty() {
            return Err(TypeError::InvalidOwner("owner token cannot be empty".into()));
        }
        if token
            .chars()
            .any(|c| c.is_whitespace() || c.is_ascii_control())
        {
            return Err(TypeError::InvalidOwner(format!(
                "owner token '{}' contains whitespace",
                token.escape_debug()
            )));
        }
        Ok(Self(token))
    }

    /// Generate a fresh, globally unique owner token (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OwnerToken {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OwnerToken> for String {
    fn from(token: OwnerToken) -> Self {
        token.0
    }
}

/// Convert a TTL to the whole milliseconds passed to `PEXPIRE`.
///
/// Sub-millisecond remainders are truncated.
///
/// # Errors
///
/// Returns `TypeError::InvalidTtl` for TTLs below one millisecond, since
/// `PEXPIRE key 0` deletes the key on the spot.
pub fn ttl_millis(ttl: Duration) -> Result<u64, TypeError> {
    let ms = ttl.as_millis();
    if ms == 0 {
        return Err(TypeError::InvalidTtl(format!(
            "ttl must be at least 1ms, got {:?}",
            ttl
        )));
    }
    Ok(u64::try_from(ms).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_accepts_hash_tags_and_colons() {
        let key = LockKey::new("{tenant}:job:42").unwrap();
        assert_eq!(key.as_str(), "{tenant}:job:42");
        assert_eq!(key.to_string(), "{tenant}:job:42");
    }

    #[test]
    fn lock_key_rejects_empty() {
        assert_eq!(
            LockKey::new(""),
            Err(TypeError::InvalidKey("lock key cannot be empty".into()))
        );
    }

    #[test]
    fn lock_key_rejects_control_chars() {
        assert!(LockKey::new("job\n42").is_err());
        assert!(LockKey::new("job\u{0}").is_err());
    }

    #[test]
    fn lock_key_serde_validates() {
        let key: LockKey = serde_json::from_str("\"orders\"").unwrap();
        assert_eq!(key.as_str(), "orders");
        assert!(serde_json::from_str::<LockKey>("\"\"").is_err());
    }

    #[test]
    fn owner_token_generate_is_unique() {
        let a = OwnerToken::generate();
        let b = OwnerToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
        assert!(OwnerToken::new(a.as_str()).is_ok());
    }

    #[test]
    fn owner_token_rejects_whitespace() {
        assert!(OwnerToken::new("").is_err());
        assert!(OwnerToken::new("a b").is_err());
        assert!(OwnerToken::new("tab\there").is_err());
    }

    #[test]
    fn ttl_millis_truncates() {
        assert_eq!(ttl_millis(Duration::from_secs(10)).unwrap(), 10_000);
        assert_eq!(ttl_millis(Duration::from_micros(1_999)).unwrap(), 1);
    }

    #[test]
    fn ttl_millis_rejects_sub_millisecond() {
        assert!(ttl_millis(Duration::ZERO).is_err());
        assert!(ttl_millis(Duration::from_micros(999)).is_err());
    }
}
