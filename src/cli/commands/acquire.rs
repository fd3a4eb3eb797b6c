//! acquire command - Acquire a lock and print its owner token

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::cli::{Context, EXIT_NOT_OBTAINED};
use crate::core::types::{LockKey, OwnerToken};

/// Acquire `key`, optionally as an existing `owner`, and print the token.
///
/// The lock is left held; it ends with `relock release` or its TTL.
pub fn acquire(
    ctx: &Context,
    key: &str,
    wait_ms: Option<u64>,
    ttl_ms: Option<u64>,
    owner: Option<&str>,
) -> Result<ExitCode> {
    let key = LockKey::new(key).context("Invalid lock key")?;
    let owner = owner
        .map(OwnerToken::new)
        .transpose()
        .context("Invalid owner token")?;
    let wait = ctx.wait_time(wait_ms);
    let ttl = ctx.ttl(ttl_ms);

    let rt = tokio::runtime::Runtime::new()?;
    let acquired = rt.block_on(async {
        let client = ctx.connect().await?;
        let result = match &owner {
            Some(owner) => {
                client
                    .try_lock_as(owner, &key, wait, ttl, ctx.lock_options())
                    .await
            }
            None => client.try_lock(&key, wait, ttl, ctx.lock_options()).await,
        };
        anyhow::Ok(result)
    })?;

    match acquired {
        Ok(lock) => {
            println!("{}", lock.owner());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_not_obtained() => {
            if !ctx.quiet {
                eprintln!("Lock '{}' not obtained within {}ms", key, wait.as_millis());
            }
            Ok(ExitCode::from(EXIT_NOT_OBTAINED))
        }
        Err(e) => Err(e).context("Failed to acquire lock"),
    }
}
