//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Read configuration from this file
//! - `--store <url>`: Store URL, overriding the config file
//! - `--debug`: Enable debug logging
//! - `--verbose` / `-v`: Enable info logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// relock - reentrant distributed locks on Redis-compatible stores
#[derive(Parser, Debug)]
#[command(name = "relock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Store URL (redis://, rediss:// or memory://)
    #[arg(long, global = true, value_name = "URL")]
    pub store: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Enable info logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true, conflicts_with_all = ["debug", "verbose"])]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Default log filter implied by the verbosity flags.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command while holding a lock
    #[command(
        name = "run",
        long_about = "Run a command while holding a lock.\n\n\
            Acquires KEY, runs the command, and releases KEY when the command \
            exits. The exit status is the command's own. If the lock cannot be \
            obtained within the wait budget, the command is not run and relock \
            exits with status 2.\n\n\
            The lock is a lease: if the command outlives --ttl, the key expires \
            and another process may acquire it.",
        after_help = "\
EXAMPLES:
    # Only one nightly job at a time, give up after 10s
    relock run nightly-report --wait 10000 -- ./report.sh

    # Fail fast if someone else is migrating
    relock run db:migrate --wait 0 --ttl 600000 -- make migrate"
    )]
    Run {
        /// Lock key
        key: String,

        /// How long to keep trying, in milliseconds
        #[arg(long, value_name = "MS")]
        wait: Option<u64>,

        /// Lease duration in milliseconds
        #[arg(long, value_name = "MS")]
        ttl: Option<u64>,

        /// Command and arguments to run
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Acquire a lock and print its owner token
    #[command(
        name = "acquire",
        long_about = "Acquire a lock and print its owner token.\n\n\
            The lock stays held until it is released with `relock release` or \
            its TTL runs out. Passing --owner with a token that already holds \
            KEY acquires it again reentrantly; each acquisition needs its own \
            release.",
        after_help = "\
EXAMPLES:
    token=$(relock acquire deploy --ttl 60000)
    relock acquire deploy --owner \"$token\"   # reentrant, count 2
    relock release deploy --owner \"$token\"   # still-held
    relock release deploy --owner \"$token\"   # released"
    )]
    Acquire {
        /// Lock key
        key: String,

        /// How long to keep trying, in milliseconds
        #[arg(long, value_name = "MS")]
        wait: Option<u64>,

        /// Lease duration in milliseconds
        #[arg(long, value_name = "MS")]
        ttl: Option<u64>,

        /// Acquire as this owner instead of a new one
        #[arg(long, value_name = "TOKEN")]
        owner: Option<String>,
    },

    /// Release one acquisition of a lock
    #[command(
        name = "release",
        long_about = "Release one acquisition of a lock.\n\n\
            Prints `released` when the key was deleted, `still-held` when the \
            owner still holds it reentrantly (the TTL is refreshed), and \
            `not-held` when the owner held nothing."
    )]
    Release {
        /// Lock key
        key: String,

        /// Owner token printed by `relock acquire`
        #[arg(long, value_name = "TOKEN")]
        owner: String,

        /// Lease applied if the owner still holds the key, in milliseconds
        #[arg(long, value_name = "MS")]
        ttl: Option<u64>,
    },

    /// Print the unlock notification channel for a key
    Channel {
        /// Lock key
        key: String,
    },

    /// Publish the unlock message for a key
    #[command(
        name = "notify",
        long_about = "Publish the unlock message on a key's channel.\n\n\
            Subscribers receive the same message a full release sends. The \
            key itself is left alone. Prints the number of subscribers that \
            received the message."
    )]
    Notify {
        /// Lock key
        key: String,
    },

    /// Show the effective configuration
    #[command(
        name = "config",
        long_about = "Show the effective configuration as TOML.\n\n\
            Every setting is listed, with defaults filled in for values the \
            config file leaves out. With --write, the effective configuration \
            is saved to the --config path or ~/.relock/config.toml."
    )]
    Config {
        /// Save the effective configuration
        #[arg(long)]
        write: bool,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    relock completion bash >> ~/.bashrc
    relock completion zsh >> ~/.zshrc
    relock completion fish > ~/.config/fish/completions/relock.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
