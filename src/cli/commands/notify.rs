//! notify command - Publish the unlock message for a key

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::types::LockKey;

/// Publish the unlock message on `key`'s channel and print the receiver count.
pub fn notify(ctx: &Context, key: &str) -> Result<ExitCode> {
    let key = LockKey::new(key).context("Invalid lock key")?;

    let rt = tokio::runtime::Runtime::new()?;
    let receivers = rt.block_on(async {
        let client = ctx.connect().await?;
        client
            .notify(&key)
            .await
            .context("Failed to publish unlock message")
    })?;

    println!("{}", receivers);
    Ok(ExitCode::SUCCESS)
}
