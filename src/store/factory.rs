//! store::factory
//!
//! Store selection and creation.
//!
//! # Design
//!
//! Callers use [`create_store`] with a URL instead of constructing a
//! specific store, so the lock layer never names an implementation. The
//! scheme picks the store:
//!
//! - `redis://`, `rediss://` → [`RedisStore`]
//! - `memory://` → a fresh [`MemoryStore`], private to this process
//!
//! # Example
//!
//! ```
//! use relock::store::{create_store, StoreSettings};
//!
//! # tokio_test::block_on(async {
//! let store = create_store("memory://", &StoreSettings::default()).await.unwrap();
//! assert_eq!(store.name(), "memory");
//! # });
//! ```

use std::sync::Arc;
use std::time::Duration;

use super::memory::MemoryStore;
use super::redis_store::RedisStore;
use super::traits::{ScriptStore, StoreError};

/// Default time allowed to establish a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for one command round trip.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Connection settings shared by all store kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

/// Supported store kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    Memory,
}

impl StoreKind {
    /// Get all store kinds.
    pub fn all() -> &'static [StoreKind] {
        &[StoreKind::Redis, StoreKind::Memory]
    }

    /// Get the store name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            StoreKind::Redis => "redis",
            StoreKind::Memory => "memory",
        }
    }

    /// Detect the store kind from a URL scheme.
    ///
    /// ```
    /// use relock::store::StoreKind;
    ///
    /// assert_eq!(StoreKind::from_url("rediss://cache:6380"), Some(StoreKind::Redis));
    /// assert_eq!(StoreKind::from_url("memory://"), Some(StoreKind::Memory));
    /// assert_eq!(StoreKind::from_url("etcd://x"), None);
    /// ```
    pub fn from_url(url: &str) -> Option<Self> {
        let (scheme, _) = url.split_once("://")?;
        match scheme.to_ascii_lowercase().as_str() {
            "redis" | "rediss" => Some(StoreKind::Redis),
            "memory" => Some(StoreKind::Memory),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Get the list of valid URL schemes.
pub fn valid_schemes() -> &'static [&'static str] {
    &["redis", "rediss", "memory"]
}

/// Create a store from a URL.
///
/// # Errors
///
/// - `UnsupportedUrl` if the scheme is not one of [`valid_schemes`]
/// - Connection errors from the chosen store
pub async fn create_store(
    url: &str,
    settings: &StoreSettings,
) -> Result<Arc<dyn ScriptStore>, StoreError> {
    let kind = StoreKind::from_url(url).ok_or_else(|| StoreError::UnsupportedUrl(url.into()))?;

    match kind {
        StoreKind::Redis => {
            let store =
                RedisStore::connect(url, settings.connect_timeout, settings.response_timeout)
                    .await?;
            Ok(Arc::new(store))
        }
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_scheme() {
        for kind in StoreKind::all() {
            assert!(valid_schemes().contains(&kind.name()));
        }
    }

    #[test]
    fn scheme_is_case_insensitive() {
        assert_eq!(StoreKind::from_url("REDIS://h"), Some(StoreKind::Redis));
    }

    #[test]
    fn url_without_scheme() {
        assert_eq!(StoreKind::from_url("localhost:6379"), None);
    }

    #[tokio::test]
    async fn memory_url_creates_memory_store() {
        let store = create_store("memory://", &StoreSettings::default())
            .await
            .unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let result = create_store("zookeeper://zk:2181", &StoreSettings::default()).await;
        assert_eq!(
            result.err(),
            Some(StoreError::UnsupportedUrl("zookeeper://zk:2181".into()))
        );
    }
}
