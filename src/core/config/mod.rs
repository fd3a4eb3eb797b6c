//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (not handled here)
//!
//! # Locations
//!
//! An explicit path (`--config`) must exist. Otherwise searched in order:
//! 1. `$RELOCK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/relock/config.toml`
//! 3. `~/.relock/config.toml` (canonical write location)
//!
//! A missing file is not an error; defaults are used.
//!
//! # Example
//!
//! ```no_run
//! use relock::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("store: {}", config.store_url());
//! println!("ttl: {:?}", config.ttl());
//! ```

pub mod schema;

pub use schema::{LockSection, RelockConfig, RetrySection, StoreSection};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::lock::retry::{no_retry, ExponentialBackoff, LimitRetry, LinearBackoff, RetryStrategy};
use crate::store::{StoreSettings, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RESPONSE_TIMEOUT};

/// Store used when none is configured.
pub const DEFAULT_STORE_URL: &str = "redis://127.0.0.1:6379/0";

/// Wait budget used when none is configured.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Lease used when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Upper bound for exponential backoff when none is configured.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: RelockConfig,
    /// Path the file was loaded from, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path is missing, or if a config file
    /// exists but cannot be parsed or fails validation.
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load and validate the config file at `path`.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: RelockConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        file.validate()?;

        Ok(Config {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    fn find_config_file() -> Option<PathBuf> {
        // 1. $RELOCK_CONFIG
        if let Ok(path) = std::env::var("RELOCK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. $XDG_CONFIG_HOME/relock/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("relock/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. ~/.relock/config.toml
        dirs::home_dir()
            .map(|home| home.join(".relock/config.toml"))
            .filter(|path| path.exists())
    }

    /// Get the canonical config path, `~/.relock/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".relock/config.toml"))
    }

    /// Write `config` to `path` atomically.
    ///
    /// Creates parent directories if needed, writes a temp file in the same
    /// directory and renames it into place.
    pub fn write_to(path: &Path, config: &RelockConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents = to_toml(config)?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    // =========================================================================
    // Accessors with defaults
    // =========================================================================

    /// Get the store URL.
    ///
    /// Defaults to [`DEFAULT_STORE_URL`].
    pub fn store_url(&self) -> &str {
        self.file
            .store
            .as_ref()
            .and_then(|s| s.url.as_deref())
            .unwrap_or(DEFAULT_STORE_URL)
    }

    /// Get the store connection settings.
    pub fn store_settings(&self) -> StoreSettings {
        let store = self.file.store.as_ref();
        StoreSettings {
            connect_timeout: store
                .and_then(|s| s.connect_timeout_ms)
                .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_millis),
            response_timeout: store
                .and_then(|s| s.response_timeout_ms)
                .map_or(DEFAULT_RESPONSE_TIMEOUT, Duration::from_millis),
        }
    }

    /// Get the default wait budget.
    pub fn wait_time(&self) -> Duration {
        self.file
            .lock
            .as_ref()
            .and_then(|l| l.wait_ms)
            .map_or(DEFAULT_WAIT, Duration::from_millis)
    }

    /// Get the default lease.
    pub fn ttl(&self) -> Duration {
        self.file
            .lock
            .as_ref()
            .and_then(|l| l.ttl_ms)
            .map_or(DEFAULT_TTL, Duration::from_millis)
    }

    /// Get the retry strategy name.
    ///
    /// Defaults to "linear".
    pub fn retry_strategy_name(&self) -> &str {
        self.file
            .retry
            .as_ref()
            .and_then(|r| r.strategy.as_deref())
            .unwrap_or("linear")
    }

    fn retry_backoff(&self) -> Duration {
        self.file
            .retry
            .as_ref()
            .and_then(|r| r.backoff_ms)
            .map_or(crate::lock::retry::DEFAULT_BACKOFF, Duration::from_millis)
    }

    fn retry_max_backoff(&self) -> Duration {
        self.file
            .retry
            .as_ref()
            .and_then(|r| r.max_backoff_ms)
            .map_or(DEFAULT_MAX_BACKOFF, Duration::from_millis)
    }

    fn retry_max_attempts(&self) -> Option<usize> {
        self.file.retry.as_ref().and_then(|r| r.max_attempts)
    }

    /// Build the retry strategy described by the `[retry]` section.
    pub fn retry_strategy(&self) -> Box<dyn RetryStrategy> {
        let base: Box<dyn RetryStrategy> = match self.retry_strategy_name() {
            "exponential" => Box::new(ExponentialBackoff::new(
                self.retry_backoff(),
                self.retry_max_backoff(),
            )),
            "none" => Box::new(no_retry()),
            _ => Box::new(LinearBackoff::new(self.retry_backoff())),
        };

        match self.retry_max_attempts() {
            Some(max) => Box::new(LimitRetry::new(base, max)),
            None => base,
        }
    }

    /// Every setting with defaults filled in.
    pub fn effective(&self) -> RelockConfig {
        let settings = self.store_settings();
        RelockConfig {
            store: Some(StoreSection {
                url: Some(self.store_url().to_string()),
                connect_timeout_ms: Some(millis(settings.connect_timeout)),
                response_timeout_ms: Some(millis(settings.response_timeout)),
            }),
            lock: Some(LockSection {
                wait_ms: Some(millis(self.wait_time())),
                ttl_ms: Some(millis(self.ttl())),
            }),
            retry: Some(RetrySection {
                strategy: Some(self.retry_strategy_name().to_string()),
                backoff_ms: Some(millis(self.retry_backoff())),
                max_backoff_ms: Some(millis(self.retry_max_backoff())),
                max_attempts: self.retry_max_attempts(),
            }),
        }
    }

    /// Get the path the config was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Serialize a config as pretty TOML.
pub fn to_toml(config: &RelockConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))
}
