//! core
//!
//! Core domain types and configuration for relock.
//!
//! # Modules
//!
//! - [`types`] - Strong types: LockKey, OwnerToken, TTL conversion
//! - [`channel`] - Unlock notification channel naming and message codes
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing rejects invalid keys and owners at the boundary
//! - Schemas are strict and self-describing

pub mod channel;
pub mod config;
pub mod types;
