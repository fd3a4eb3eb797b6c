//! cli
//!
//! Command-line interface layer for relock.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the log subscriber
//! - Resolve configuration (file, then flag overrides) into a [`Context`]
//! - Delegate to command handlers
//!
//! # Exit Status
//!
//! `0` on success, [`EXIT_NOT_OBTAINED`] when a lock could not be acquired,
//! `1` on any other error. `run` passes through its child's status.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::lock::{LockClient, LockOptions};

/// Exit status when a lock is not obtained.
pub const EXIT_NOT_OBTAINED: u8 = 2;

/// Resolved settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration.
    pub config: Config,
    /// Explicit `--config` path, if given.
    pub config_path: Option<PathBuf>,
    /// Store URL after the `--store` override.
    pub store_url: String,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

impl Context {
    /// Build a context from parsed flags.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
        let store_url = cli
            .store
            .clone()
            .unwrap_or_else(|| config.store_url().to_string());

        Ok(Self {
            config,
            config_path: cli.config.clone(),
            store_url,
            quiet: cli.quiet,
        })
    }

    /// Connect a lock client to the configured store.
    pub async fn connect(&self) -> Result<LockClient> {
        LockClient::connect(&self.store_url, &self.config.store_settings())
            .await
            .with_context(|| format!("Failed to connect to store '{}'", self.store_url))
    }

    /// Wait budget: the flag if given, else the configured default.
    pub fn wait_time(&self, flag_ms: Option<u64>) -> Duration {
        flag_ms.map_or_else(|| self.config.wait_time(), Duration::from_millis)
    }

    /// Lease: the flag if given, else the configured default.
    pub fn ttl(&self, flag_ms: Option<u64>) -> Duration {
        flag_ms.map_or_else(|| self.config.ttl(), Duration::from_millis)
    }

    /// Lock options carrying the configured retry strategy.
    pub fn lock_options(&self) -> LockOptions {
        LockOptions::new().boxed_retry_strategy(self.config.retry_strategy())
    }
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins over the verbosity flags when set.
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("relock={}", default_level)));

    // A second install (e.g. in tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    init_logging(cli.log_level());

    let ctx = Context::from_cli(&cli)?;
    commands::dispatch(cli.command, &ctx)
}
