//! The `store` module is the document store the service talks to.
//!
//! It uses `sled` as an embedded key-value store. Documents are JSON values
//! kept under `(collection, id)`; each collection is its own sled tree.

pub mod sled_store;

use std::sync::{Arc, PoisonError, RwLock};

pub use sled_store::DocumentStore;

use crate::utils::error::StoreError;

/// Process-wide store handle, empty until a connect succeeds.
#[derive(Clone, Debug, Default)]
pub struct SharedStore {
    slot: Arc<RwLock<Option<DocumentStore>>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<DocumentStore> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.handle().is_some()
    }

    /// Opens the database at `path` and installs it. `memory://` opens a
    /// temporary database.
    pub async fn connect(&self, path: &str) -> Result<(), StoreError> {
        let store = if path.starts_with("memory://") {
            DocumentStore::temporary()?
        } else {
            DocumentStore::open(path).await?
        };
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(store);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
