//! Client-side replica of the catalog.
//!
//! A replica is the other end of a [`SyncSession`](crate::SyncSession): one
//! document and one sync state, talking to exactly one store. Outgoing
//! messages go through an attached transport; without one, operations that
//! need to send fail with [`Error::NotConnected`].

use std::sync::Arc;

use automerge::sync;

use crate::codec;
use crate::document::{CatalogEditor, Document};
use crate::error::{Error, Result};
use crate::peer::PeerTransport;
use crate::record::Record;

pub struct Replica {
    doc: Document,
    sync_state: sync::State,
    outbound: Option<Arc<dyn PeerTransport>>,
}

impl Replica {
    /// A replica with no history, filled entirely by the first sync.
    pub fn empty() -> Self {
        Self::from_document(Document::empty())
    }

    /// A replica seeded locally.
    ///
    /// Seeding with the same records as the store gives both sides a common
    /// ancestor, so local edits made before the first sync still merge.
    pub fn from_seed(seed: &[Record]) -> Result<Self> {
        Ok(Self::from_document(Document::seeded(seed)?))
    }

    pub fn from_document(doc: Document) -> Self {
        Self {
            doc,
            sync_state: sync::State::new(),
            outbound: None,
        }
    }

    /// Connect an outbound transport and flush to it.
    ///
    /// The sync state starts over on every attach, at the cost of one
    /// redundant exchange.
    pub fn attach(&mut self, transport: Arc<dyn PeerTransport>) -> Result<usize> {
        self.sync_state = sync::State::new();
        self.outbound = Some(transport);
        self.flush()
    }

    /// Drop the outbound transport.
    pub fn detach(&mut self) {
        if let Some(transport) = self.outbound.take() {
            transport.close();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.outbound.is_some()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn snapshot(&self) -> Vec<Record> {
        self.doc.records()
    }

    pub fn record(&self, id: &str) -> Option<Record> {
        self.doc.record(id)
    }

    /// Merge one inbound message and answer it if attached.
    pub fn receive(&mut self, encoded: &str) -> Result<()> {
        let message = codec::decode_message(encoded)?;
        self.doc.receive_sync_message(&mut self.sync_state, message)?;
        if self.outbound.is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Edit the local document as one change, then flush if attached.
    pub fn mutate<F, T>(&mut self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut CatalogEditor<'_, '_>) -> Result<T>,
    {
        let value = self.doc.edit(edit)?;
        if self.outbound.is_some() {
            self.flush()?;
        }
        Ok(value)
    }

    /// Send every pending message to the attached transport.
    pub fn flush(&mut self) -> Result<usize> {
        let transport = self.outbound.clone().ok_or(Error::NotConnected)?;
        let mut sent = 0;
        while let Some(message) = self.doc.generate_sync_message(&mut self.sync_state) {
            transport.deliver(&codec::encode_message(message))?;
            sent += 1;
        }
        Ok(sent)
    }
}

impl Default for Replica {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Roast;
    use tokio::sync::mpsc;

    fn seed() -> Vec<Record> {
        vec![Record::new(
            "cosmos",
            "Cosmos Reserve",
            "Kenya",
            Roast::Light,
            vec!["bergamot".into()],
            21,
            21.0,
        )]
    }

    #[test]
    fn flush_without_transport_is_not_connected() {
        let mut replica = Replica::from_seed(&seed()).unwrap();
        assert_eq!(replica.flush().unwrap_err(), Error::NotConnected);
    }

    #[test]
    fn local_edit_without_transport_still_applies() {
        let mut replica = Replica::from_seed(&seed()).unwrap();
        replica
            .mutate(|editor| editor.set_stock("cosmos", 3))
            .unwrap();
        assert_eq!(replica.record("cosmos").unwrap().stock, 3);
    }

    #[test]
    fn replicas_converge_over_channels() {
        let mut left = Replica::from_seed(&seed()).unwrap();
        let mut right = Replica::empty();

        let (left_tx, mut left_rx) = mpsc::unbounded_channel::<String>();
        let (right_tx, mut right_rx) = mpsc::unbounded_channel::<String>();
        left.attach(Arc::new(left_tx)).unwrap();
        right.attach(Arc::new(right_tx)).unwrap();

        loop {
            let mut moved = false;
            while let Ok(message) = left_rx.try_recv() {
                right.receive(&message).unwrap();
                moved = true;
            }
            while let Ok(message) = right_rx.try_recv() {
                left.receive(&message).unwrap();
                moved = true;
            }
            if !moved {
                break;
            }
        }

        assert_eq!(right.snapshot(), seed());
        assert_eq!(left.document().heads(), right.document().heads());
    }

    #[test]
    fn detach_closes_transport() {
        let mut replica = Replica::empty();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        replica.attach(Arc::new(tx)).unwrap();
        assert!(replica.is_attached());

        replica.detach();
        assert!(!replica.is_attached());
        while rx.try_recv().is_ok() {}
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
