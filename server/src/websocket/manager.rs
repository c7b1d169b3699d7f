//! WebSocket connection manager.
//!
//! Tracks active WebSocket connections together with the sync session and
//! catalog subscription each one holds, so both are released when the
//! connection goes away.

use std::sync::Arc;

use beanline_engine::{Subscription, SyncSession};
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: String,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
    session: Option<Arc<SyncSession>>,
    subscription: Option<Subscription>,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: DashMap<String, Connection>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection.
    ///
    /// Returns the connection ID.
    pub fn register(&self, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(
            conn_id.clone(),
            Connection {
                id: conn_id.clone(),
                sender,
                session: None,
                subscription: None,
            },
        );

        tracing::info!(conn_id = %conn_id, "WebSocket connection registered");

        conn_id
    }

    /// Unregister a connection, closing its session and subscription.
    pub fn unregister(&self, conn_id: &str) -> bool {
        let Some((_, conn)) = self.connections.remove(conn_id) else {
            return false;
        };
        if let Some(session) = &conn.session {
            session.close();
        }
        if let Some(subscription) = &conn.subscription {
            subscription.close();
        }

        tracing::info!(conn_id = %conn.id, "WebSocket connection unregistered");
        true
    }

    /// A clone of the connection's outgoing channel.
    pub fn sender(&self, conn_id: &str) -> Option<MessageSender> {
        self.connections.get(conn_id).map(|conn| conn.sender.clone())
    }

    /// Attach a sync session, closing the one it replaces.
    ///
    /// An unknown connection gets its session closed straight away.
    pub fn set_session(&self, conn_id: &str, session: Arc<SyncSession>) {
        let previous = match self.connections.get_mut(conn_id) {
            Some(mut conn) => conn.session.replace(session),
            None => Some(session),
        };
        if let Some(previous) = previous {
            previous.close();
        }
    }

    /// The connection's open sync session.
    pub fn session(&self, conn_id: &str) -> Option<Arc<SyncSession>> {
        self.connections
            .get(conn_id)
            .and_then(|conn| conn.session.clone())
    }

    /// Detach the connection's sync session without closing it.
    pub fn take_session(&self, conn_id: &str) -> Option<Arc<SyncSession>> {
        self.connections
            .get_mut(conn_id)
            .and_then(|mut conn| conn.session.take())
    }

    /// Attach a catalog subscription, closing the one it replaces.
    pub fn set_subscription(&self, conn_id: &str, subscription: Subscription) {
        let previous = match self.connections.get_mut(conn_id) {
            Some(mut conn) => conn.subscription.replace(subscription),
            None => Some(subscription),
        };
        if let Some(previous) = previous {
            previous.close();
        }
    }

    /// Detach the connection's subscription without closing it.
    pub fn take_subscription(&self, conn_id: &str) -> Option<Subscription> {
        self.connections
            .get_mut(conn_id)
            .and_then(|mut conn| conn.subscription.take())
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        if let Some(conn) = self.connections.get(conn_id) {
            conn.sender.send(message).is_ok()
        } else {
            false
        }
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Unregister every connection, returning how many there were.
    pub fn close_all(&self) -> usize {
        let ids: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.unregister(id)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beanline_engine::{fixtures, DocumentStore, Record};

    #[test]
    fn test_register_unregister() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let conn_id = manager.register(tx);
        assert_eq!(manager.connection_count(), 1);

        assert!(manager.unregister(&conn_id));
        assert!(!manager.unregister(&conn_id));
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn test_send_to() {
        let manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn_id = manager.register(tx);

        assert!(manager.send_to(&conn_id, ServerMessage::Pong));
        assert!(!manager.send_to("missing", ServerMessage::Pong));
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::Pong));
    }

    #[tokio::test]
    async fn test_unregister_releases_session_and_subscription() {
        let store = Arc::new(DocumentStore::init(&fixtures::seed_records(), None).unwrap());
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn_id = manager.register(tx);

        let session = store.open_peer(None).await;
        manager.set_session(&conn_id, Arc::new(session));
        let subscription = store.subscribe(|_: &[Record]| {}).await;
        manager.set_subscription(&conn_id, subscription);
        assert_eq!(store.peer_count(), 1);
        assert_eq!(store.listener_count(), 1);

        assert_eq!(manager.close_all(), 1);
        assert_eq!(store.peer_count(), 0);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_replacing_a_session_closes_the_old_one() {
        let store = Arc::new(DocumentStore::init(&fixtures::seed_records(), None).unwrap());
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn_id = manager.register(tx);

        manager.set_session(&conn_id, Arc::new(store.open_peer(None).await));
        manager.set_session(&conn_id, Arc::new(store.open_peer(None).await));
        assert_eq!(store.peer_count(), 1);

        let session = manager.take_session(&conn_id).unwrap();
        assert!(manager.session(&conn_id).is_none());
        session.close();
        assert_eq!(store.peer_count(), 0);
    }
}
