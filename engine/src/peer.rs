//! Peer bookkeeping and the drain loop.
//!
//! Every connected peer owns one automerge sync state, tracking what this side
//! believes the peer has already seen. Draining a peer repeatedly asks the
//! document for the next message for that state and hands each one to the
//! peer's transport, until the document reports nothing left to send.

use std::sync::Arc;

use automerge::sync;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::codec;
use crate::document::Document;
use crate::error::{Error, Result};

/// Identifier of a connected peer.
pub type PeerId = String;

/// A transport rejected an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DeliveryError(pub String);

impl From<DeliveryError> for Error {
    fn from(err: DeliveryError) -> Self {
        Error::Delivery(err.0)
    }
}

/// Outbound side of a peer connection.
///
/// `deliver` is called from inside the store's serialized section and must
/// not block: implementations push onto a channel or buffer.
pub trait PeerTransport: Send + Sync {
    /// Hand one base64-encoded sync message to the peer.
    fn deliver(&self, message: &str) -> std::result::Result<(), DeliveryError>;

    /// Called once when the peer is removed from the store.
    fn close(&self) {}
}

impl PeerTransport for mpsc::UnboundedSender<String> {
    fn deliver(&self, message: &str) -> std::result::Result<(), DeliveryError> {
        self.send(message.to_string())
            .map_err(|_| DeliveryError("peer channel closed".into()))
    }
}

struct PeerRecord {
    sync_state: sync::State,
    transport: Option<Arc<dyn PeerTransport>>,
}

/// Outcome of draining every peer after a change.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Messages handed to transports
    pub delivered: usize,
    /// Peers whose transport rejected a message
    pub failed: Vec<PeerId>,
}

/// Table of connected peers, keyed by peer id.
#[derive(Default)]
pub struct PeerTable {
    peers: DashMap<PeerId, PeerRecord>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer with a fresh sync state.
    ///
    /// A peer without a transport is tracked but never drained.
    pub fn open(&self, transport: Option<Arc<dyn PeerTransport>>) -> PeerId {
        let peer_id = uuid::Uuid::new_v4().to_string();
        self.peers.insert(
            peer_id.clone(),
            PeerRecord {
                sync_state: sync::State::new(),
                transport,
            },
        );
        tracing::info!(peer_id = %peer_id, "Peer opened");
        peer_id
    }

    /// Remove a peer. Returns `false` if it was not registered.
    pub fn close(&self, peer_id: &str) -> bool {
        match self.peers.remove(peer_id) {
            Some((_, record)) => {
                if let Some(transport) = record.transport {
                    transport.close();
                }
                tracing::info!(peer_id = %peer_id, "Peer closed");
                true
            }
            None => false,
        }
    }

    /// Remove every peer.
    pub fn close_all(&self) -> usize {
        let ids = self.ids();
        ids.iter().filter(|id| self.close(id)).count()
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Ids of every registered peer.
    pub fn ids(&self) -> Vec<PeerId> {
        self.peers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Merge a message from `peer_id` into `doc`, updating that peer's state.
    ///
    /// Returns `Ok(false)` if the peer is not registered; the document is not
    /// touched in that case.
    pub fn receive(&self, doc: &mut Document, peer_id: &str, message: sync::Message) -> Result<bool> {
        let Some(mut peer) = self.peers.get_mut(peer_id) else {
            return Ok(false);
        };
        doc.receive_sync_message(&mut peer.sync_state, message)?;
        Ok(true)
    }

    /// Drain all pending messages for one peer against `doc`.
    ///
    /// Stops at the first delivery error. State already advanced by the
    /// messages generated so far is kept. Returns the number of messages
    /// delivered.
    pub fn drain(&self, doc: &Document, peer_id: &str) -> std::result::Result<usize, DeliveryError> {
        let transport = match self.peers.get(peer_id) {
            Some(peer) => peer.transport.clone(),
            None => return Ok(0),
        };
        let Some(transport) = transport else {
            return Ok(0);
        };

        let mut delivered = 0;
        loop {
            // The entry guard is dropped before delivering so a transport may
            // close its own peer without deadlocking.
            let message = match self.peers.get_mut(peer_id) {
                Some(mut peer) => doc.generate_sync_message(&mut peer.sync_state),
                None => break,
            };
            let Some(message) = message else {
                break;
            };
            transport.deliver(&codec::encode_message(message))?;
            delivered += 1;
        }

        if delivered > 0 {
            tracing::trace!(peer_id = %peer_id, messages = delivered, "Drained peer");
        }
        Ok(delivered)
    }

    /// Drain every peer. A failing peer does not affect the others.
    pub fn drain_all(&self, doc: &Document) -> DrainReport {
        let mut report = DrainReport::default();
        for peer_id in self.ids() {
            match self.drain(doc, &peer_id) {
                Ok(count) => report.delivered += count,
                Err(e) => {
                    tracing::warn!(peer_id = %peer_id, error = %e, "Delivery to peer failed");
                    report.failed.push(peer_id);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, Roast};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing;

    impl PeerTransport for Failing {
        fn deliver(&self, _message: &str) -> std::result::Result<(), DeliveryError> {
            Err(DeliveryError("socket gone".into()))
        }
    }

    #[derive(Default)]
    struct CloseCounter(AtomicUsize);

    impl PeerTransport for CloseCounter {
        fn deliver(&self, _message: &str) -> std::result::Result<(), DeliveryError> {
            Ok(())
        }

        fn close(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn doc() -> Document {
        Document::seeded(&[Record::new(
            "a",
            "A",
            "Peru",
            Roast::Dark,
            vec![],
            10,
            17.25,
        )])
        .unwrap()
    }

    #[test]
    fn open_and_close() {
        let table = PeerTable::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = table.open(Some(Arc::new(tx)));

        assert!(table.contains(&id));
        assert_eq!(table.len(), 1);

        assert!(table.close(&id));
        assert!(!table.close(&id));
        assert!(table.is_empty());
    }

    #[test]
    fn close_notifies_transport_once() {
        let table = PeerTable::new();
        let transport = Arc::new(CloseCounter::default());
        let id = table.open(Some(transport.clone()));

        table.close(&id);
        table.close(&id);
        assert_eq!(transport.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_delivers_until_exhausted() {
        let table = PeerTable::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = table.open(Some(Arc::new(tx)));

        let delivered = table.drain(&doc(), &id).unwrap();
        assert!(delivered >= 1);

        let mut received = 0;
        while let Ok(message) = rx.try_recv() {
            assert!(codec::decode_message(&message).is_ok());
            received += 1;
        }
        assert_eq!(received, delivered);

        // Nothing new until the peer answers.
        assert_eq!(table.drain(&doc(), &id).unwrap(), 0);
    }

    #[test]
    fn peer_without_transport_is_not_drained() {
        let table = PeerTable::new();
        let id = table.open(None);
        assert_eq!(table.drain(&doc(), &id).unwrap(), 0);
    }

    #[test]
    fn failing_peer_does_not_block_others() {
        let table = PeerTable::new();
        let failing = table.open(Some(Arc::new(Failing)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let healthy = table.open(Some(Arc::new(tx)));

        let report = table.drain_all(&doc());
        assert_eq!(report.failed, vec![failing]);
        assert!(report.delivered >= 1);
        assert!(rx.try_recv().is_ok());
        assert!(table.contains(&healthy));
    }

    #[test]
    fn unknown_peer_receive_is_noop() {
        let table = PeerTable::new();
        let source = doc();
        let mut state = sync::State::new();
        let message = source.generate_sync_message(&mut state).unwrap();

        let mut target = Document::empty();
        assert!(!table.receive(&mut target, "ghost", message).unwrap());
        assert!(target.records().is_empty());
    }
}
