use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::Db;

use crate::utils::error::StoreError;

/// JSON documents in named collections, one sled tree per collection.
#[derive(Clone)]
pub struct DocumentStore {
    db: Db,
}

impl DocumentStore {
    /// Opens (or creates) the database at `path`. sled opens synchronously,
    /// so the open runs on the blocking pool.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || sled::open(path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;
        Ok(Self { db })
    }

    /// Database that lives only as long as the process.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn insert<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(doc)?;
        self.db.open_tree(collection)?.insert(id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>, StoreError> {
        match self.db.open_tree(collection)?.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Removes a document. Returns whether it existed.
    pub fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .db
            .open_tree(collection)?
            .remove(id.as_bytes())?
            .is_some())
    }

    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self.db.open_tree(collection)?.len())
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("db", &"sled::Db")
            .finish()
    }
}
