//! channel command - Print the unlock notification channel for a key

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::core::channel::channel_name;
use crate::core::types::LockKey;

/// Print the channel a full release of `key` publishes on.
pub fn channel(key: &str) -> Result<ExitCode> {
    let key = LockKey::new(key).context("Invalid lock key")?;
    println!("{}", channel_name(&key));
    Ok(ExitCode::SUCCESS)
}
