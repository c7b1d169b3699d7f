//! The hosted catalog: one document store backed by a keyed byte store.

use std::sync::Arc;

use async_trait::async_trait;
use beanline_engine::{fixtures, DocumentStore, Error as EngineError, PersistError, PersistHook};

use crate::db::ByteStore;
use crate::error::Result;

/// Persistence hook writing every accepted change back under one key.
pub struct BlobPersist {
    bytes: Arc<dyn ByteStore>,
    key: String,
}

impl BlobPersist {
    pub fn new(bytes: Arc<dyn ByteStore>, key: impl Into<String>) -> Self {
        Self {
            bytes,
            key: key.into(),
        }
    }
}

#[async_trait]
impl PersistHook for BlobPersist {
    async fn persist(&self, bytes: Vec<u8>) -> std::result::Result<(), PersistError> {
        self.bytes
            .put(&self.key, &bytes)
            .await
            .map_err(|e| PersistError(e.to_string()))
    }
}

/// The single catalog served by this process.
pub struct InventoryHost {
    store: Arc<DocumentStore>,
    key: String,
}

impl InventoryHost {
    /// Load the catalog stored under `key`, or seed a new one.
    ///
    /// A blob that does not deserialize is discarded and replaced by the
    /// default seed.
    pub async fn open(bytes: Arc<dyn ByteStore>, key: &str) -> Result<Self> {
        let hook: Arc<dyn PersistHook> = Arc::new(BlobPersist::new(bytes.clone(), key));

        let loaded = match bytes.get(key).await? {
            Some(blob) => match DocumentStore::load_from_binary(&blob, Some(hook.clone())) {
                Ok(store) => {
                    tracing::info!(key = %key, size = blob.len(), "Loaded catalog document");
                    Some(store)
                }
                Err(EngineError::CorruptDocument(reason)) => {
                    tracing::warn!(key = %key, reason = %reason, "Discarding corrupt catalog document");
                    bytes.delete(key).await?;
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let store = match loaded {
            Some(store) => store,
            None => {
                let store = DocumentStore::init(&fixtures::seed_records(), Some(hook))?;
                bytes.put(key, &store.save()).await?;
                tracing::info!(key = %key, records = store.snapshot().len(), "Seeded catalog document");
                store
            }
        };

        Ok(Self {
            store: Arc::new(store),
            key: key.to_string(),
        })
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}
