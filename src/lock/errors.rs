//! lock::errors
//!
//! Error type for lock acquisition and release.
//!
//! # Example
//!
//! ```
//! use relock::lock::LockError;
//!
//! let err = LockError::NotObtained;
//! assert!(err.is_not_obtained());
//! assert_eq!(err.to_string(), "lock not obtained");
//! ```

use thiserror::Error;

use crate::core::types::TypeError;
use crate::store::StoreError;

/// Errors from lock operations.
///
/// Callers get exactly one of: a lock, `NotObtained`, or the store error that
/// aborted the attempt. Contention is the only outcome the retry loop absorbs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    /// The key stayed held by another owner until the wait budget or retry
    /// policy ran out, or the acquisition was cancelled.
    #[error("lock not obtained")]
    NotObtained,

    /// Release attempted on a lock this owner does not hold.
    ///
    /// Reserved: the release path reports this case as
    /// [`ReleaseOutcome::NotHeld`](super::ReleaseOutcome::NotHeld) instead.
    #[error("lock not held")]
    LockNotHeld,

    /// A lock argument failed validation.
    #[error(transparent)]
    Invalid(#[from] TypeError),

    /// The store failed; never retried by the coordinator.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A script replied with a value outside its documented outcomes.
    #[error("unexpected reply from {script} script: {reply}")]
    UnexpectedReply {
        /// Script name
        script: &'static str,
        /// Rendered reply
        reply: String,
    },
}

impl LockError {
    /// Check if this is the contention outcome.
    pub fn is_not_obtained(&self) -> bool {
        matches!(self, LockError::NotObtained)
    }

    /// Check if this error is a transport failure that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            LockError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}
