//! store::cache
//!
//! Per-client cache of loaded script handles.
//!
//! # Design
//!
//! Each [`LockClient`](crate::lock::LockClient) owns one `ScriptCache`. A
//! script is loaded on first use and its handle kept. When the store answers
//! `NoScript` (script cache flushed, failover to a fresh replica) the handle
//! is dropped, the script reloaded, and the call retried exactly once.
//!
//! The mutex only guards the map and is never held across an await.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::traits::{Reply, Script, ScriptHandle, ScriptStore, StoreError};

/// Lazily populated script-name → handle map.
#[derive(Debug, Default)]
pub struct ScriptCache {
    handles: Mutex<HashMap<&'static str, ScriptHandle>>,
}

impl ScriptCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached handle for `script`, if any.
    pub fn cached(&self, script: &Script) -> Option<ScriptHandle> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(script.name())
            .cloned()
    }

    /// Forget the handle for `script`.
    pub fn invalidate(&self, script: &Script) {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(script.name());
    }

    /// Get the handle for `script`, loading it if needed.
    pub async fn handle(
        &self,
        store: &dyn ScriptStore,
        script: &Script,
    ) -> Result<ScriptHandle, StoreError> {
        if let Some(handle) = self.cached(script) {
            return Ok(handle);
        }
        self.load(store, script).await
    }

    /// Load every script in `scripts`, replacing cached handles.
    pub async fn preload(
        &self,
        store: &dyn ScriptStore,
        scripts: &[Script],
    ) -> Result<(), StoreError> {
        for script in scripts {
            self.load(store, script).await?;
        }
        Ok(())
    }

    /// Evaluate `script`, loading it on first use and reloading once on a
    /// `NoScript` miss.
    pub async fn evaluate(
        &self,
        store: &dyn ScriptStore,
        script: &Script,
        keys: &[String],
        args: &[String],
    ) -> Result<Reply, StoreError> {
        let handle = self.handle(store, script).await?;
        match store.eval(&handle, keys, args).await {
            Err(StoreError::NoScript(_)) => {
                warn!(script = script.name(), "script missing from store, reloading");
                self.invalidate(script);
                let handle = self.load(store, script).await?;
                store.eval(&handle, keys, args).await
            }
            other => other,
        }
    }

    async fn load(
        &self,
        store: &dyn ScriptStore,
        script: &Script,
    ) -> Result<ScriptHandle, StoreError> {
        let handle = store.load_script(script.source()).await?;
        debug!(script = script.name(), handle = %handle, "loaded script");
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(script.name(), handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::scripts::{ACQUIRE_SCRIPT, RELEASE_SCRIPT};
    use crate::store::memory::{FailOn, MemoryStore, MockOperation};

    fn acquire_args(owner: &str) -> (Vec<String>, Vec<String>) {
        (
            vec!["k".to_string()],
            vec!["1000".to_string(), owner.to_string()],
        )
    }

    fn load_count(store: &MemoryStore) -> usize {
        store
            .operations()
            .iter()
            .filter(|op| matches!(op, MockOperation::LoadScript { .. }))
            .count()
    }

    #[tokio::test]
    async fn loads_once_then_reuses_handle() {
        let store = MemoryStore::new();
        let cache = ScriptCache::new();
        let (keys, args) = acquire_args("a");

        cache
            .evaluate(&store, &ACQUIRE_SCRIPT, &keys, &args)
            .await
            .unwrap();
        cache
            .evaluate(&store, &ACQUIRE_SCRIPT, &keys, &args)
            .await
            .unwrap();

        assert_eq!(load_count(&store), 1);
        assert!(cache.cached(&ACQUIRE_SCRIPT).is_some());
        assert!(cache.cached(&RELEASE_SCRIPT).is_none());
    }

    #[tokio::test]
    async fn reloads_after_flush() {
        let store = MemoryStore::new();
        let cache = ScriptCache::new();
        let (keys, args) = acquire_args("a");

        cache
            .evaluate(&store, &ACQUIRE_SCRIPT, &keys, &args)
            .await
            .unwrap();
        store.flush_scripts();

        let reply = cache
            .evaluate(&store, &ACQUIRE_SCRIPT, &keys, &args)
            .await
            .unwrap();

        assert_eq!(reply, Reply::Nil);
        assert_eq!(load_count(&store), 2);
        assert_eq!(store.hold_count("k", "a"), Some(2));
    }

    #[tokio::test]
    async fn load_failure_propagates() {
        let store = MemoryStore::new()
            .fail_on(FailOn::LoadScript(StoreError::Connection("refused".into())));
        let cache = ScriptCache::new();
        let (keys, args) = acquire_args("a");

        let result = cache.evaluate(&store, &ACQUIRE_SCRIPT, &keys, &args).await;

        assert_eq!(result, Err(StoreError::Connection("refused".into())));
        assert!(cache.cached(&ACQUIRE_SCRIPT).is_none());
    }

    #[tokio::test]
    async fn preload_populates_every_script() {
        let store = MemoryStore::new();
        let cache = ScriptCache::new();

        cache
            .preload(&store, &[ACQUIRE_SCRIPT, RELEASE_SCRIPT])
            .await
            .unwrap();

        assert!(cache.cached(&ACQUIRE_SCRIPT).is_some());
        assert!(cache.cached(&RELEASE_SCRIPT).is_some());
        assert_ne!(cache.cached(&ACQUIRE_SCRIPT), cache.cached(&RELEASE_SCRIPT));
    }
}
