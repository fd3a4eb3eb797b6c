//! lock::scripts
//!
//! The acquire and release scripts and the decoding of their replies.
//!
//! # Stored state
//!
//! A held lock key is a hash with one field per owner token; the field value
//! is that owner's hold count. The key carries a millisecond expiry and is
//! deleted when the count reaches zero.
//!
//! # Reply encoding
//!
//! | Script  | Reply            | Meaning                                    |
//! |---------|------------------|--------------------------------------------|
//! | acquire | nil              | acquired (fresh or reentrant)              |
//! | acquire | integer          | held by another owner; remaining PTTL (ms) |
//! | release | nil              | owner holds nothing on this key            |
//! | release | 0                | count decremented, still held              |
//! | release | 1                | count reached zero, key deleted, published |
//!
//! Acquire success is signalled by nil, so decoding maps nil to
//! [`AcquireReply::Acquired`] explicitly rather than treating it as an error.

use std::time::Duration;

use crate::core::channel::{channel_name, UNLOCK_MESSAGE};
use crate::core::types::{LockKey, OwnerToken};
use crate::store::{Reply, Script};

use super::LockError;

/// KEYS[1] = lock key, ARGV[1] = ttl ms, ARGV[2] = owner field.
pub const ACQUIRE_SCRIPT: Script = Script::new(
    "acquire",
    r#"
if (redis.call('exists', KEYS[1]) == 0) then
    redis.call('hincrby', KEYS[1], ARGV[2], 1);
    redis.call('pexpire', KEYS[1], ARGV[1]);
    return nil;
end;
if (redis.call('hexists', KEYS[1], ARGV[2]) == 1) then
    redis.call('hincrby', KEYS[1], ARGV[2], 1);
    redis.call('pexpire', KEYS[1], ARGV[1]);
    return nil;
end;
return redis.call('pttl', KEYS[1]);
"#,
);

/// KEYS[1] = lock key, KEYS[2] = channel,
/// ARGV[1] = message, ARGV[2] = ttl ms, ARGV[3] = owner field.
pub const RELEASE_SCRIPT: Script = Script::new(
    "release",
    r#"
if (redis.call('hexists', KEYS[1], ARGV[3]) == 0) then
    return nil;
end;
local counter = redis.call('hincrby', KEYS[1], ARGV[3], -1);
if (counter > 0) then
    redis.call('pexpire', KEYS[1], ARGV[2]);
    return 0;
else
    redis.call('del', KEYS[1]);
    redis.call('publish', KEYS[2], ARGV[1]);
    return 1;
end;
"#,
);

/// Decoded reply of the acquire script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireReply {
    /// The caller now holds the key (count incremented, expiry set).
    Acquired,
    /// Another owner holds the key.
    Contended {
        /// Remaining expiry of the key; `None` if the key has no expiry.
        remaining_ttl: Option<Duration>,
    },
}

/// Outcome of one release step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The owner held nothing on the key; nothing changed.
    NotHeld,
    /// The owner's count was decremented and is still positive; expiry
    /// refreshed.
    StillHeld,
    /// The count reached zero: key deleted, unlock message published.
    Released,
}

impl ReleaseOutcome {
    /// Short machine-readable label, as printed by the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseOutcome::NotHeld => "not-held",
            ReleaseOutcome::StillHeld => "still-held",
            ReleaseOutcome::Released => "released",
        }
    }
}

impl std::fmt::Display for ReleaseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys for the acquire script.
pub fn acquire_keys(key: &LockKey) -> Vec<String> {
    vec![key.as_str().to_string()]
}

/// Arguments for the acquire script.
pub fn acquire_args(ttl_ms: u64, owner: &OwnerToken) -> Vec<String> {
    vec![ttl_ms.to_string(), owner.as_str().to_string()]
}

/// Keys for the release script: the lock key and its notification channel.
pub fn release_keys(key: &LockKey) -> Vec<String> {
    vec![key.as_str().to_string(), channel_name(key)]
}

/// Arguments for the release script.
pub fn release_args(ttl_ms: u64, owner: &OwnerToken) -> Vec<String> {
    vec![
        UNLOCK_MESSAGE.to_string(),
        ttl_ms.to_string(),
        owner.as_str().to_string(),
    ]
}

/// Decode the acquire script's reply.
///
/// # Errors
///
/// `LockError::UnexpectedReply` for anything but nil or an integer.
pub fn decode_acquire(reply: Reply) -> Result<AcquireReply, LockError> {
    match reply {
        Reply::Nil => Ok(AcquireReply::Acquired),
        Reply::Int(ms) => Ok(AcquireReply::Contended {
            remaining_ttl: u64::try_from(ms).ok().map(Duration::from_millis),
        }),
        other => Err(LockError::UnexpectedReply {
            script: ACQUIRE_SCRIPT.name(),
            reply: other.to_string(),
        }),
    }
}

/// Decode the release script's reply.
///
/// # Errors
///
/// `LockError::UnexpectedReply` for anything but nil, 0 or 1.
pub fn decode_release(reply: Reply) -> Result<ReleaseOutcome, LockError> {
    match reply {
        Reply::Nil => Ok(ReleaseOutcome::NotHeld),
        Reply::Int(0) => Ok(ReleaseOutcome::StillHeld),
        Reply::Int(1) => Ok(ReleaseOutcome::Released),
        other => Err(LockError::UnexpectedReply {
            script: RELEASE_SCRIPT.name(),
            reply: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_nil_is_success() {
        assert_eq!(decode_acquire(Reply::Nil), Ok(AcquireReply::Acquired));
    }

    #[test]
    fn acquire_integer_is_remaining_ttl() {
        assert_eq!(
            decode_acquire(Reply::Int(9_500)),
            Ok(AcquireReply::Contended {
                remaining_ttl: Some(Duration::from_millis(9_500))
            })
        );
    }

    #[test]
    fn acquire_negative_pttl_has_no_ttl() {
        assert_eq!(
            decode_acquire(Reply::Int(-1)),
            Ok(AcquireReply::Contended {
                remaining_ttl: None
            })
        );
    }

    #[test]
    fn acquire_rejects_other_shapes() {
        let err = decode_acquire(Reply::Other("bulk \"OK\"".into())).unwrap_err();
        assert!(matches!(
            err,
            LockError::UnexpectedReply {
                script: "acquire",
                ..
            }
        ));
    }

    #[test]
    fn release_outcomes() {
        assert_eq!(decode_release(Reply::Nil), Ok(ReleaseOutcome::NotHeld));
        assert_eq!(decode_release(Reply::Int(0)), Ok(ReleaseOutcome::StillHeld));
        assert_eq!(decode_release(Reply::Int(1)), Ok(ReleaseOutcome::Released));
    }

    #[test]
    fn release_rejects_unknown_integer() {
        assert!(matches!(
            decode_release(Reply::Int(2)),
            Err(LockError::UnexpectedReply {
                script: "release",
                ..
            })
        ));
    }

    #[test]
    fn release_keys_include_channel() {
        let key = LockKey::new("job:42").unwrap();
        assert_eq!(
            release_keys(&key),
            vec![
                "job:42".to_string(),
                "redisson_lock__channel:{job:42}".to_string()
            ]
        );
    }

    #[test]
    fn release_args_order() {
        let owner = OwnerToken::new("owner-a").unwrap();
        assert_eq!(
            release_args(10_000, &owner),
            vec!["0".to_string(), "10000".to_string(), "owner-a".to_string()]
        );
        assert_eq!(
            acquire_args(10_000, &owner),
            vec!["10000".to_string(), "owner-a".to_string()]
        );
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(ReleaseOutcome::Released.to_string(), "released");
        assert_eq!(ReleaseOutcome::StillHeld.as_str(), "still-held");
        assert_eq!(ReleaseOutcome::NotHeld.as_str(), "not-held");
    }
}
