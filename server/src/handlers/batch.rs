//! Sync sessions over plain HTTP requests.
//!
//! Each session buffers the messages the store produces for it in an outbox.
//! Every request hands one inbound message (or none) to the store and returns
//! whatever accumulated in the outbox since the previous request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use beanline_engine::{DeliveryError, DocumentStore, PeerTransport, SyncSession};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Buffer of outgoing sync messages for one HTTP session.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl Outbox {
    /// Take every buffered message.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PeerTransport for Outbox {
    fn deliver(&self, message: &str) -> std::result::Result<(), DeliveryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeliveryError("outbox closed".into()));
        }
        self.lock().push(message.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

struct BatchSession {
    session: Arc<SyncSession>,
    outbox: Arc<Outbox>,
}

/// Messages returned by a batch sync request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncBatch {
    pub session_id: String,
    pub messages: Vec<String>,
}

/// Body of a batch sync request; `message: null` is a keepalive.
#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Open HTTP sync sessions, keyed by session id.
#[derive(Default)]
pub struct BatchSessions {
    sessions: DashMap<String, BatchSession>,
}

impl BatchSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session and return the messages drained at open.
    pub async fn open(&self, store: &Arc<DocumentStore>) -> SyncBatch {
        let outbox = Arc::new(Outbox::default());
        let session = store.open_sync_channel(outbox.clone()).await;
        let session_id = session.peer_id().to_string();

        let batch = SyncBatch {
            session_id: session_id.clone(),
            messages: outbox.take(),
        };
        self.sessions.insert(
            session_id,
            BatchSession {
                session: Arc::new(session),
                outbox,
            },
        );
        batch
    }

    /// Deliver one message and collect the replies.
    ///
    /// Returns `Ok(None)` for an unknown session.
    pub async fn send(&self, session_id: &str, message: Option<&str>) -> Result<Option<SyncBatch>> {
        let Some((session, outbox)) = self
            .sessions
            .get(session_id)
            .map(|entry| (entry.session.clone(), entry.outbox.clone()))
        else {
            return Ok(None);
        };

        session.send(message).await?;
        Ok(Some(SyncBatch {
            session_id: session_id.to_string(),
            messages: outbox.take(),
        }))
    }

    /// Close one session. Returns `false` if it was not open.
    pub fn close(&self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, entry)) => {
                entry.session.close();
                true
            }
            None => false,
        }
    }

    /// Close every session, returning how many were open.
    pub fn close_all(&self) -> usize {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.close(id)).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beanline_engine::{fixtures, Replica};

    #[tokio::test]
    async fn batch_session_syncs_a_replica() {
        let store = Arc::new(DocumentStore::init(&fixtures::seed_records(), None).unwrap());
        let sessions = BatchSessions::new();

        let opened = sessions.open(&store).await;
        assert!(!opened.messages.is_empty());

        let outbox = Arc::new(Outbox::default());
        let mut replica = Replica::empty();
        replica.attach(outbox.clone()).unwrap();

        let mut inbound = opened.messages;
        for _ in 0..32 {
            for message in inbound.drain(..) {
                replica.receive(&message).unwrap();
            }
            let outbound = outbox.take();
            if outbound.is_empty() {
                break;
            }
            for message in outbound {
                let batch = sessions
                    .send(&opened.session_id, Some(message.as_str()))
                    .await
                    .unwrap()
                    .unwrap();
                inbound.extend(batch.messages);
            }
        }

        assert_eq!(replica.snapshot(), store.snapshot());
    }

    #[tokio::test]
    async fn closed_session_is_forgotten() {
        let store = Arc::new(DocumentStore::init(&fixtures::seed_records(), None).unwrap());
        let sessions = BatchSessions::new();
        let opened = sessions.open(&store).await;

        assert!(sessions.close(&opened.session_id));
        assert!(!sessions.close(&opened.session_id));
        assert_eq!(store.peer_count(), 0);
        assert!(sessions
            .send(&opened.session_id, None)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn closed_outbox_rejects_delivery() {
        let outbox = Outbox::default();
        outbox.deliver("a").unwrap();
        outbox.close();
        assert!(outbox.deliver("b").is_err());
        assert_eq!(outbox.take(), vec!["a".to_string()]);
    }
}
