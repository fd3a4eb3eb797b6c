//! lock::retry
//!
//! Backoff policies for the acquisition loop.
//!
//! # Design
//!
//! A strategy is asked for the next wait each time acquisition hits
//! contention. Returning `None` stops the loop with `NotObtained`. Strategies
//! are stateful (`&mut self`) and owned by a single `try_lock` call.
//!
//! `LimitRetry` is a decorator and composes with any strategy, including
//! another `LimitRetry`.
//!
//! # Example
//!
//! ```
//! use relock::lock::retry::{LimitRetry, LinearBackoff, RetryStrategy};
//! use std::time::Duration;
//!
//! let mut retry = LimitRetry::new(LinearBackoff::new(Duration::from_millis(50)), 2);
//! assert_eq!(retry.next_backoff(), Some(Duration::from_millis(50)));
//! assert_eq!(retry.next_backoff(), Some(Duration::from_millis(50)));
//! assert_eq!(retry.next_backoff(), None);
//! ```

use std::fmt;
use std::time::Duration;

/// Backoff used when no strategy is configured.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Produces successive waits between contended attempts.
pub trait RetryStrategy: Send + fmt::Debug {
    /// The next wait, or `None` to stop retrying.
    ///
    /// Implementations return `None` rather than a zero duration.
    fn next_backoff(&mut self) -> Option<Duration>;
}

impl<S: RetryStrategy + ?Sized> RetryStrategy for Box<S> {
    fn next_backoff(&mut self) -> Option<Duration> {
        (**self).next_backoff()
    }
}

fn non_zero(backoff: Duration) -> Option<Duration> {
    if backoff.is_zero() {
        None
    } else {
        Some(backoff)
    }
}

/// Retries at a fixed interval. A zero interval means a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff(Duration);

impl LinearBackoff {
    /// Retry every `backoff`.
    pub fn new(backoff: Duration) -> Self {
        Self(backoff)
    }

    /// Attempt once, never retry.
    pub fn no_retry() -> Self {
        Self(Duration::ZERO)
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.0
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self(DEFAULT_BACKOFF)
    }
}

impl RetryStrategy for LinearBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        non_zero(self.0)
    }
}

/// Attempt once, never retry.
pub fn no_retry() -> LinearBackoff {
    LinearBackoff::no_retry()
}

/// Doubles the wait after every contended attempt, from `min` up to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    tries: u32,
}

impl ExponentialBackoff {
    /// Start at `min`, never exceed `max`.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            tries: 0,
        }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        let factor = 1u32.checked_shl(self.tries).unwrap_or(u32::MAX);
        self.tries = self.tries.saturating_add(1);
        let backoff = self
            .min
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max);
        non_zero(backoff)
    }
}

/// Caps another strategy at `max` backoffs.
///
/// Delegates while fewer than `max` backoffs have been handed out, then
/// stops for good, whatever the wrapped strategy would say.
#[derive(Debug, Clone)]
pub struct LimitRetry<S> {
    inner: S,
    attempts: usize,
    max: usize,
}

impl<S: RetryStrategy> LimitRetry<S> {
    /// Wrap `inner`, allowing at most `max` retries.
    pub fn new(inner: S, max: usize) -> Self {
        Self {
            inner,
            attempts: 0,
            max,
        }
    }

    /// Number of backoffs requested so far (capped at `max`).
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl<S: RetryStrategy> RetryStrategy for LimitRetry<S> {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempts >= self.max {
            return None;
        }
        self.attempts += 1;
        self.inner.next_backoff()
    }
}
