//! The `cache` module holds the shared cache handle and the read-through
//! gate that short-circuits requests with precomputed responses.

pub mod gate;
pub mod store;

use std::sync::{Arc, PoisonError, RwLock};

pub use gate::{CacheGate, cache_gate};
pub use store::{CacheStore, MemoryStore, RedisStore};

use crate::utils::error::CacheError;

/// Process-wide cache handle. Empty until a connect succeeds; clones share
/// the same slot.
#[derive(Clone, Default)]
pub struct SharedCache {
    slot: Arc<RwLock<Option<Arc<dyn CacheStore>>>>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The connected store, or `None` while not connected.
    pub fn handle(&self) -> Option<Arc<dyn CacheStore>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.handle().is_some()
    }

    pub fn install(&self, store: Arc<dyn CacheStore>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(store);
    }

    /// Connects to `uri` (`redis://`, `rediss://` or `memory://`) and
    /// installs the store.
    pub async fn connect(&self, uri: &str) -> Result<(), CacheError> {
        let store: Arc<dyn CacheStore> = match uri.split_once("://").map(|(scheme, _)| scheme) {
            Some("redis") | Some("rediss") => Arc::new(RedisStore::connect(uri).await?),
            Some("memory") => Arc::new(MemoryStore::new()),
            _ => return Err(CacheError::UnsupportedUri(uri.to_string())),
        };
        self.install(store);
        Ok(())
    }
}

impl std::fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache")
            .field("connected", &self.is_connected())
            .finish()
    }
}
