//! run command - Run a child process while holding a lock

use std::future;
use std::process::{ExitCode, ExitStatus};

use anyhow::{anyhow, Context as _, Result};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::cli::{Context, EXIT_NOT_OBTAINED};
use crate::core::types::LockKey;

/// Acquire `key`, run `command`, release `key`.
///
/// Returns the child's exit status, or [`EXIT_NOT_OBTAINED`] if the lock
/// was not obtained (including Ctrl-C while waiting).
pub fn run(
    ctx: &Context,
    key: &str,
    wait_ms: Option<u64>,
    ttl_ms: Option<u64>,
    command: &[String],
) -> Result<ExitCode> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(ctx, key, wait_ms, ttl_ms, command))
}

async fn run_async(
    ctx: &Context,
    key: &str,
    wait_ms: Option<u64>,
    ttl_ms: Option<u64>,
    command: &[String],
) -> Result<ExitCode> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("No command given"))?;
    let key = LockKey::new(key).context("Invalid lock key")?;
    let wait = ctx.wait_time(wait_ms);
    let client = ctx.connect().await?;

    let acquired = client
        .try_lock_cancellable(
            None,
            &key,
            wait,
            ctx.ttl(ttl_ms),
            ctx.lock_options(),
            interrupted(),
        )
        .await;

    let lock = match acquired {
        Ok(lock) => lock,
        Err(e) if e.is_not_obtained() => {
            if !ctx.quiet {
                eprintln!("Lock '{}' not obtained within {}ms", key, wait.as_millis());
            }
            return Ok(ExitCode::from(EXIT_NOT_OBTAINED));
        }
        Err(e) => return Err(e).context("Failed to acquire lock"),
    };

    debug!(key = %key, program = %program, "running command");
    let status = Command::new(program).args(args).status().await;

    // Release even if the child could not be spawned.
    match lock.unlock().await {
        Ok(outcome) => debug!(key = %key, %outcome, "released after command"),
        Err(e) => warn!(key = %key, error = %e, "release failed; lock will expire"),
    }

    let status = status.with_context(|| format!("Failed to run '{}'", program))?;
    Ok(exit_code(status))
}

/// Completes on Ctrl-C. Never completes if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        future::pending::<()>().await;
    }
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        // Killed by a signal.
        None => ExitCode::FAILURE,
    }
}
