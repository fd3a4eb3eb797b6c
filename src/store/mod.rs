//! store
//!
//! The key-value store the lock protocol runs against.
//!
//! # Architecture
//!
//! The [`ScriptStore`] trait is the only thing the lock layer depends on:
//! load a script, evaluate it atomically, publish a message. Commands obtain
//! a store through [`create_store`] rather than importing an implementation.
//!
//! # Modules
//!
//! - `traits`: `ScriptStore`, `StoreError`, script and reply types
//! - `cache`: per-client script handle cache with reload on `NoScript`
//! - [`redis_store`]: Redis over a multiplexed async connection
//! - [`memory`]: in-process store for tests and single-host use
//! - `factory`: store selection from a URL

mod cache;
mod factory;
pub mod memory;
pub mod redis_store;
mod traits;

pub use cache::ScriptCache;
pub use factory::{
    create_store, valid_schemes, StoreKind, StoreSettings, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_RESPONSE_TIMEOUT,
};
pub use traits::{Reply, Script, ScriptHandle, ScriptStore, StoreError};
