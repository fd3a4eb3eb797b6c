//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$RELOCK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/relock/config.toml`
//! 3. `~/.relock/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Values are validated after parsing: the store URL must use a supported
//! scheme, TTLs must be at least one millisecond, and the retry strategy must
//! be a known name.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Top-level configuration file.
///
/// # Example
///
/// ```toml
/// [store]
/// url = "redis://127.0.0.1:6379/0"
/// connect_timeout_ms = 5000
/// response_timeout_ms = 3000
///
/// [lock]
/// wait_ms = 5000
/// ttl_ms = 30000
///
/// [retry]
/// strategy = "exponential"
/// backoff_ms = 100
/// max_backoff_ms = 2000
/// max_attempts = 20
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RelockConfig {
    /// Store connection settings
    pub store: Option<StoreSection>,

    /// Lock defaults
    pub lock: Option<LockSection>,

    /// Retry policy
    pub retry: Option<RetrySection>,
}

impl RelockConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(store) = &self.store {
            store.validate()?;
        }
        if let Some(lock) = &self.lock {
            lock.validate()?;
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        Ok(())
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    /// Store URL (`redis://`, `rediss://` or `memory://`)
    pub url: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Per-command timeout in milliseconds
    pub response_timeout_ms: Option<u64>,
}

impl StoreSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.url {
            if crate::store::StoreKind::from_url(url).is_none() {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid store url '{}', scheme must be one of: {}",
                    url,
                    crate::store::valid_schemes().join(", ")
                )));
            }
        }
        for (name, value) in [
            ("store.connect_timeout_ms", self.connect_timeout_ms),
            ("store.response_timeout_ms", self.response_timeout_ms),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// `[lock]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LockSection {
    /// How long to keep trying, in milliseconds
    pub wait_ms: Option<u64>,

    /// Lease duration in milliseconds
    pub ttl_ms: Option<u64>,
}

impl LockSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "lock.ttl_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    /// "linear", "exponential" or "none"
    pub strategy: Option<String>,

    /// Interval (linear) or first wait (exponential), in milliseconds
    pub backoff_ms: Option<u64>,

    /// Upper bound for exponential waits, in milliseconds
    pub max_backoff_ms: Option<u64>,

    /// Cap on the number of retries
    pub max_attempts: Option<usize>,
}

impl RetrySection {
    /// Valid strategy names.
    pub const VALID_STRATEGIES: &'static [&'static str] = &["linear", "exponential", "none"];

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(strategy) = &self.strategy {
            if !Self::VALID_STRATEGIES.contains(&strategy.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid retry strategy '{}', must be one of: {}",
                    strategy,
                    Self::VALID_STRATEGIES.join(", ")
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.backoff_ms, self.max_backoff_ms) {
            if max < min {
                return Err(ConfigError::InvalidValue(format!(
                    "retry.max_backoff_ms ({}) is below retry.backoff_ms ({})",
                    max, min
                )));
            }
        }
        Ok(())
    }
}
