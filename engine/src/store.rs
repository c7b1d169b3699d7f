//! Store - the owner of the current catalog document.
//!
//! The Store publishes one [`Document`] at a time behind an `Arc`. Every local
//! edit and every inbound merge is applied to a private copy; if the copy's
//! heads moved, it is published and then fanned out through the commit path:
//!
//! 1. the persistence hook is awaited with the new serialized form
//! 2. listeners are notified with a fresh snapshot
//! 3. every connected peer is drained
//!
//! Writers (`mutate`, `receive`, `open_peer`, `subscribe`, `replace_document`)
//! are serialized by an async lock held across the whole commit path. Readers
//! never wait on it.

use std::sync::{Arc, RwLock};

use rand::Rng;
use tokio::sync::Mutex;

use crate::codec;
use crate::document::{CatalogEditor, Document};
use crate::error::{Error, Result};
use crate::generator;
use crate::notifier::{ChangeNotifier, Subscription};
use crate::peer::{PeerId, PeerTable, PeerTransport};
use crate::persist::PersistHook;
use crate::record::{FieldChange, Record};
use crate::session::SyncSession;

/// The document store.
pub struct DocumentStore {
    current: RwLock<Arc<Document>>,
    writer: Mutex<()>,
    peers: PeerTable,
    notifier: ChangeNotifier,
    persist: Option<Arc<dyn PersistHook>>,
}

impl DocumentStore {
    /// Create a store holding `seed`.
    ///
    /// An empty seed still produces an editable document with an empty record
    /// list.
    pub fn init(seed: &[Record], persist: Option<Arc<dyn PersistHook>>) -> Result<Self> {
        Ok(Self::with_document(Document::seeded(seed)?, persist))
    }

    /// Restore a store from a saved document.
    ///
    /// Fails with [`Error::CorruptDocument`] when `bytes` do not hold a
    /// catalog document. The caller is expected to fall back to [`init`].
    ///
    /// [`init`]: DocumentStore::init
    pub fn load_from_binary(bytes: &[u8], persist: Option<Arc<dyn PersistHook>>) -> Result<Self> {
        Ok(Self::with_document(Document::load(bytes)?, persist))
    }

    fn with_document(doc: Document, persist: Option<Arc<dyn PersistHook>>) -> Self {
        Self {
            current: RwLock::new(Arc::new(doc)),
            writer: Mutex::new(()),
            peers: PeerTable::new(),
            notifier: ChangeNotifier::new(),
            persist,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The currently published document.
    pub fn document(&self) -> Arc<Document> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Deep copy of every record, newest first.
    pub fn snapshot(&self) -> Vec<Record> {
        self.document().records()
    }

    /// Same as [`snapshot`](DocumentStore::snapshot).
    pub fn list_records(&self) -> Vec<Record> {
        self.snapshot()
    }

    /// Look up a record by id.
    pub fn get_record(&self, id: &str) -> Option<Record> {
        self.document().record(id)
    }

    /// Serialized form of the current document.
    pub fn save(&self) -> Vec<u8> {
        self.document().save()
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.notifier.len()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Apply `edit` as one change.
    ///
    /// If the edit fails nothing is published. If it succeeds without moving
    /// the document's heads, nothing is persisted or broadcast. A persistence
    /// failure is returned even though listeners and peers have already seen
    /// the new document.
    pub async fn mutate<F, T>(&self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut CatalogEditor<'_, '_>) -> Result<T> + Send,
        T: Send,
    {
        let _guard = self.writer.lock().await;

        let mut next = Document::clone(&self.document());
        let before = next.heads();
        let value = next.edit(edit)?;

        if next.heads() != before {
            self.commit(next).await?;
        }
        Ok(value)
    }

    /// Insert the record produced by `factory` at the front of the list.
    pub async fn create_record<F>(&self, factory: F) -> Result<Record>
    where
        F: FnOnce() -> Record + Send,
    {
        let record = factory();
        let inserted = record.clone();
        self.mutate(move |editor| editor.insert_front(&inserted)).await?;
        Ok(record)
    }

    /// Apply a single field change, returning the updated record.
    pub async fn mutate_field(&self, id: &str, change: FieldChange) -> Result<Record> {
        self.mutate(|editor| editor.apply(id, &change)).await
    }

    /// Nudge the stock of one random record by one unit.
    ///
    /// Returns `None` when the catalog is empty.
    pub async fn bump_random_stock<R>(&self, rng: &mut R) -> Result<Option<Record>>
    where
        R: Rng + Send,
    {
        self.mutate(|editor| {
            if editor.is_empty() {
                return Ok(None);
            }
            let index = rng.gen_range(0..editor.len());
            let Some(id) = editor.id_at(index) else {
                return Ok(None);
            };
            let delta = generator::perturb_delta(rng);
            editor
                .apply(&id, &FieldChange::Stock { delta })
                .map(Some)
        })
        .await
    }

    /// Swap in a document loaded from `bytes` through the commit path.
    pub async fn replace_document(&self, bytes: &[u8]) -> Result<()> {
        let next = Document::load(bytes)?;
        let _guard = self.writer.lock().await;

        if next.heads() != self.document().heads() {
            self.commit(next).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register `listener` and immediately call it with the current snapshot.
    ///
    /// The replay happens under the writer lock, so it always precedes any
    /// notification for a later change.
    pub async fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        let _guard = self.writer.lock().await;
        let listener: crate::notifier::Listener = Arc::new(listener);
        let subscription = self.notifier.register(listener.clone());
        listener(&self.snapshot());
        subscription
    }

    // ========================================================================
    // Peers
    // ========================================================================

    /// Register a peer and drain the current document to it.
    pub async fn open_peer(
        self: &Arc<Self>,
        transport: Option<Arc<dyn PeerTransport>>,
    ) -> SyncSession {
        let _guard = self.writer.lock().await;
        let peer_id = self.peers.open(transport);
        self.drain_peer(&peer_id);
        SyncSession::new(Arc::clone(self), peer_id)
    }

    /// Open a sync channel delivering outgoing messages to `transport`.
    pub async fn open_sync_channel(self: &Arc<Self>, transport: Arc<dyn PeerTransport>) -> SyncSession {
        self.open_peer(Some(transport)).await
    }

    /// Handle one inbound message from `peer_id`.
    ///
    /// Unknown peers are ignored. `None` is a keepalive that only drains the
    /// peer. A message that fails to decode or merge is rejected with
    /// [`Error::MalformedMessage`] and the document is left untouched.
    pub async fn receive(&self, peer_id: &str, message: Option<&str>) -> Result<()> {
        if !self.peers.contains(peer_id) {
            return Ok(());
        }
        let _guard = self.writer.lock().await;

        let Some(encoded) = message else {
            self.drain_peer(peer_id);
            return Ok(());
        };

        let message = codec::decode_message(encoded).inspect_err(|e| {
            tracing::warn!(peer_id = %peer_id, error = %e, "Rejected inbound sync message");
        })?;

        let mut next = Document::clone(&self.document());
        let before = next.heads();
        let known = self
            .peers
            .receive(&mut next, peer_id, message)
            .inspect_err(|e| {
                tracing::warn!(peer_id = %peer_id, error = %e, "Failed to merge sync message");
            })?;
        if !known {
            return Ok(());
        }

        if next.heads() != before {
            // Draining every peer includes this one.
            self.commit(next).await
        } else {
            self.drain_peer(peer_id);
            Ok(())
        }
    }

    /// Remove a peer. Later messages for it are ignored.
    ///
    /// Does not wait for an in-flight write to finish.
    pub fn close_peer(&self, peer_id: &str) -> bool {
        self.peers.close(peer_id)
    }

    /// Remove every peer, returning how many were closed.
    pub fn close_all_peers(&self) -> usize {
        self.peers.close_all()
    }

    // ========================================================================
    // Commit path
    // ========================================================================

    async fn commit(&self, next: Document) -> Result<()> {
        let next = Arc::new(next);
        self.publish(Arc::clone(&next));

        let persisted = match &self.persist {
            Some(hook) => hook.persist(next.save()).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to persist document");
                Error::from(e)
            }),
            None => Ok(()),
        };

        self.notifier.notify(&next.records());
        let report = self.peers.drain_all(&next);
        tracing::debug!(
            delivered = report.delivered,
            failed = report.failed.len(),
            "Committed document change"
        );

        persisted
    }

    fn publish(&self, next: Arc<Document>) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }

    fn drain_peer(&self, peer_id: &str) {
        let doc = self.document();
        if let Err(e) = self.peers.drain(&doc, peer_id) {
            tracing::warn!(peer_id = %peer_id, error = %e, "Delivery to peer failed");
        }
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("peers", &self.peers.len())
            .field("listeners", &self.notifier.len())
            .field("persist", &self.persist.is_some())
            .finish()
    }
}
