//! store::traits
//!
//! The store capability the lock protocol is built on.
//!
//! # Design
//!
//! The lock needs exactly three things from the store: load a script and get
//! a handle back, evaluate a loaded script atomically, and publish a message.
//! `ScriptStore` is async because every one of them is a network round trip.
//!
//! Replies are returned as a [`Reply`], a deliberately small view of the wire
//! value. Scripts decode it into their own closed outcome types; anything
//! outside the expected shapes is reported, never cast.
//!
//! # Example
//!
//! ```ignore
//! use relock::store::{Reply, ScriptStore, StoreError};
//!
//! async fn ping(store: &dyn ScriptStore) -> Result<(), StoreError> {
//!     let handle = store.load_script("return 1").await?;
//!     let reply = store.eval(&handle, &[], &[]).await?;
//!     assert_eq!(reply, Reply::Int(1));
//!     Ok(())
//! }
//! ```

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from store operations.
///
/// These are transport and protocol failures. The lock coordinator never
/// retries them; they propagate to the caller unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Could not reach the store, or the connection dropped.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store did not answer within the response timeout.
    #[error("store timed out after {0}ms")]
    Timeout(u64),

    /// The script handle is not known to the store (e.g. after a restart or
    /// `SCRIPT FLUSH`). The script cache reloads and retries once.
    #[error("script not loaded: {0}")]
    NoScript(String),

    /// The script ran but raised an error.
    #[error("script error: {0}")]
    Script(String),

    /// The store cannot run this script at all.
    #[error("unsupported script: {0}")]
    UnsupportedScript(String),

    /// Malformed or unexpected wire-level response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No store implementation for this URL.
    #[error("unsupported store url '{0}' (valid schemes: redis, rediss, memory)")]
    UnsupportedUrl(String),
}

impl StoreError {
    /// Check if this error is likely to go away on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Timeout(_))
    }
}

/// Opaque handle to a script loaded into the store.
///
/// For Redis this is the SHA1 digest returned by `SCRIPT LOAD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptHandle(String);

impl ScriptHandle {
    /// Wrap a handle returned by the store.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Get the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named server-side script.
///
/// The name keys the per-client handle cache and shows up in logs and
/// errors; the source is what gets loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Script {
    name: &'static str,
    source: &'static str,
}

impl Script {
    /// Create a script from a static source.
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    /// Script name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Script source.
    pub fn source(&self) -> &'static str {
        self.source
    }
}

/// A script reply, reduced to the shapes the lock scripts can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nil / absent (a Lua `nil` or `false`).
    Nil,
    /// An integer.
    Int(i64),
    /// Anything else, rendered for diagnostics.
    Other(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Nil => write!(f, "nil"),
            Reply::Int(i) => write!(f, "integer {}", i),
            Reply::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Atomic script execution and publishing against a shared store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store is shared by every lock
/// created from a client.
///
/// # Atomicity
///
/// `eval` must run the whole script without interleaving with any other
/// client's commands. Mutual exclusion rests entirely on this.
#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// Get the store name (e.g., "redis", "memory").
    fn name(&self) -> &'static str;

    /// Load a script and return its handle.
    ///
    /// # Errors
    ///
    /// - `Script` if the store rejects the source
    /// - `Connection` / `Timeout` on transport failure
    async fn load_script(&self, source: &str) -> Result<ScriptHandle, StoreError>;

    /// Evaluate a previously loaded script atomically.
    ///
    /// # Errors
    ///
    /// - `NoScript` if the handle is unknown to the store
    /// - `Script` if the script raised an error
    /// - `Connection` / `Timeout` on transport failure
    async fn eval(
        &self,
        handle: &ScriptHandle,
        keys: &[String],
        args: &[String],
    ) -> Result<Reply, StoreError>;

    /// Publish `payload` on `channel`, returning the number of receivers.
    ///
    /// Releases publish from inside the script; this is for messages sent
    /// outside one, such as `LockClient::notify`.
    async fn publish(&self, channel: &str, payload: &str) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_dyn_store(_: &dyn ScriptStore) {}

    #[test]
    fn transient_errors() {
        assert!(StoreError::Connection("reset".into()).is_transient());
        assert!(StoreError::Timeout(500).is_transient());
        assert!(!StoreError::NoScript("abc".into()).is_transient());
        assert!(!StoreError::Script("ERR".into()).is_transient());
    }

    #[test]
    fn reply_display() {
        assert_eq!(Reply::Nil.to_string(), "nil");
        assert_eq!(Reply::Int(-2).to_string(), "integer -2");
        assert_eq!(Reply::Other("status OK".into()).to_string(), "status OK");
    }

    #[test]
    fn script_accessors() {
        const S: Script = Script::new("ping", "return 1");
        assert_eq!(S.name(), "ping");
        assert_eq!(S.source(), "return 1");
    }
}
