//! lock::options
//!
//! Per-call acquisition options.

use super::retry::{LinearBackoff, RetryStrategy};

/// Options for one `try_lock` call.
///
/// # Example
///
/// ```
/// use relock::lock::retry::{LimitRetry, LinearBackoff};
/// use relock::lock::LockOptions;
/// use std::time::Duration;
///
/// let opts = LockOptions::new().retry_strategy(LimitRetry::new(
///     LinearBackoff::new(Duration::from_millis(100)),
///     10,
/// ));
/// ```
#[derive(Debug, Default)]
pub struct LockOptions {
    retry: Option<Box<dyn RetryStrategy>>,
}

impl LockOptions {
    /// Options with the default retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `strategy` between contended attempts.
    pub fn retry_strategy(mut self, strategy: impl RetryStrategy + 'static) -> Self {
        self.retry = Some(Box::new(strategy));
        self
    }

    /// Use an already boxed strategy (e.g. one built from configuration).
    pub fn boxed_retry_strategy(mut self, strategy: Box<dyn RetryStrategy>) -> Self {
        self.retry = Some(strategy);
        self
    }

    /// Take the configured strategy, falling back to a 1s linear backoff
    /// with no attempt cap.
    pub(crate) fn into_retry_strategy(self) -> Box<dyn RetryStrategy> {
        self.retry
            .unwrap_or_else(|| Box::new(LinearBackoff::default()))
    }
}
