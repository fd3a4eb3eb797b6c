//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the lock client
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! Commands that talk to the store are async. Each one builds its own
//! `tokio::runtime::Runtime` and blocks on it, so `dispatch` stays sync.

mod acquire;
mod channel;
mod completion;
mod config_cmd;
mod notify;
mod release;
mod run;

pub use acquire::acquire;
pub use channel::channel;
pub use completion::completion;
pub use config_cmd::config;
pub use notify::notify;
pub use release::release;
pub use run::run;

use std::process::ExitCode;

use anyhow::Result;

use super::args::Command;
use super::Context;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<ExitCode> {
    match command {
        Command::Run {
            key,
            wait,
            ttl,
            command,
        } => run::run(ctx, &key, wait, ttl, &command),
        Command::Acquire {
            key,
            wait,
            ttl,
            owner,
        } => acquire::acquire(ctx, &key, wait, ttl, owner.as_deref()),
        Command::Release { key, owner, ttl } => release::release(ctx, &key, &owner, ttl),
        Command::Channel { key } => channel::channel(&key),
        Command::Notify { key } => notify::notify(ctx, &key),
        Command::Config { write } => config_cmd::config(ctx, write),
        Command::Completion { shell } => completion::completion(shell),
    }
}
