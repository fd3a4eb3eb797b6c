//! release command - Undo one acquisition of a lock

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::types::{LockKey, OwnerToken};

/// Release `key` once on behalf of `owner` and print the outcome.
///
/// `not-held` is a normal outcome, not an error.
pub fn release(ctx: &Context, key: &str, owner: &str, ttl_ms: Option<u64>) -> Result<ExitCode> {
    let key = LockKey::new(key).context("Invalid lock key")?;
    let owner = OwnerToken::new(owner).context("Invalid owner token")?;
    let ttl = ctx.ttl(ttl_ms);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        let client = ctx.connect().await?;
        client
            .adopt(key, owner, ttl)
            .unlock()
            .await
            .context("Failed to release lock")
    })?;

    println!("{}", outcome);
    Ok(ExitCode::SUCCESS)
}
