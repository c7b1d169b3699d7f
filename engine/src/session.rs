//! Peer-facing handle for one sync session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::peer::PeerId;
use crate::store::DocumentStore;

/// A peer's connection to a [`DocumentStore`].
///
/// Created by [`DocumentStore::open_peer`]. Outgoing messages reach the peer
/// through the transport given at open time; incoming ones are handed to
/// [`send`](SyncSession::send).
#[derive(Debug)]
pub struct SyncSession {
    store: Arc<DocumentStore>,
    peer_id: PeerId,
    closed: AtomicBool,
}

impl SyncSession {
    pub(crate) fn new(store: Arc<DocumentStore>, peer_id: PeerId) -> Self {
        Self {
            store,
            peer_id,
            closed: AtomicBool::new(false),
        }
    }

    /// Identifier of the underlying peer.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Deliver one message from the peer to the store.
    ///
    /// `None` is a keepalive. Does nothing once the session is closed.
    pub async fn send(&self, message: Option<&str>) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.store.receive(&self.peer_id, message).await
    }

    /// Close the session. Only the first call reaches the store.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.store.close_peer(&self.peer_id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{DeliveryError, PeerTransport};
    use crate::record::{Record, Roast};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingTransport {
        closes: AtomicUsize,
    }

    impl PeerTransport for CountingTransport {
        fn deliver(&self, _message: &str) -> std::result::Result<(), DeliveryError> {
            Ok(())
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn store() -> Arc<DocumentStore> {
        let seed = [Record::new(
            "pulsar",
            "Pulsar Decaf",
            "Peru",
            Roast::Dark,
            vec!["smoke".into()],
            44,
            17.25,
        )];
        Arc::new(DocumentStore::init(&seed, None).unwrap())
    }

    #[tokio::test]
    async fn concurrent_close_reaches_store_once() {
        let store = store();
        let transport = Arc::new(CountingTransport::default());
        let session = Arc::new(store.open_sync_channel(transport.clone()).await);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                std::thread::spawn(move || session.close())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(session.is_closed());
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
        assert_eq!(store.peer_count(), 0);
    }

    #[tokio::test]
    async fn send_after_close_is_ignored() {
        let store = store();
        let session = store.open_peer(None).await;
        session.close();

        assert!(session.send(Some("not even base64!")).await.is_ok());
    }

    #[tokio::test]
    async fn keepalive_is_accepted() {
        let store = store();
        let session = store.open_peer(None).await;
        assert!(session.send(None).await.is_ok());
        assert!(!session.peer_id().is_empty());
    }
}
