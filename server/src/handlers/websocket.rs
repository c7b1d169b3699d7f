//! WebSocket handler for real-time sync.
//!
//! Handles WebSocket connections and dispatches messages to the store, the
//! connection's sync session, or its catalog subscription.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::websocket::{ClientMessage, ServerMessage, SocketTransport};
use crate::AppState;

use super::{handle_create, handle_list, handle_mutate};

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the connection with the manager
/// 2. Spawns a task to forward outgoing messages
/// 3. Processes incoming messages in a loop
/// 4. Cleans up on disconnect
pub async fn handle_websocket_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Replies, sync pushes and subscription pushes all go through one channel
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let conn_manager = state.conn_manager.clone();
    let conn_id = conn_manager.register(tx);

    tracing::info!(conn_id = %conn_id, "WebSocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Some(response) = process_message(&text, &state, &conn_id).await {
                    conn_manager.send_to(&conn_id, response);
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    conn_manager.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        active_connections = conn_manager.connection_count(),
        "WebSocket client disconnected"
    );
}

/// Process a client message and return the direct response, if any.
pub(crate) async fn process_message(
    text: &str,
    state: &AppState,
    conn_id: &str,
) -> Option<ServerMessage> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return Some(ServerMessage::error(
                format!("Invalid message format: {}", e),
                None,
            ));
        }
    };

    let store = &state.store;
    let conn_manager = &state.conn_manager;

    let response = match client_msg {
        ClientMessage::OpenSync { request_id } => {
            let Some(sender) = conn_manager.sender(conn_id) else {
                return Some(ServerMessage::error("unknown connection", request_id));
            };
            let session = store
                .open_sync_channel(Arc::new(SocketTransport::new(sender)))
                .await;
            tracing::debug!(conn_id = %conn_id, peer_id = %session.peer_id(), "Sync session opened");
            conn_manager.set_session(conn_id, Arc::new(session));
            ServerMessage::ack(request_id)
        }

        ClientMessage::Sync {
            message,
            request_id,
        } => {
            let Some(session) = conn_manager.session(conn_id) else {
                return Some(ServerMessage::error("no open sync session", request_id));
            };
            match session.send(message.as_deref()).await {
                Ok(()) => return None,
                Err(e) => ServerMessage::error(e.to_string(), request_id),
            }
        }

        ClientMessage::CloseSync { request_id } => {
            if let Some(session) = conn_manager.take_session(conn_id) {
                session.close();
            }
            ServerMessage::ack(request_id)
        }

        ClientMessage::Subscribe { request_id } => {
            let Some(sender) = conn_manager.sender(conn_id) else {
                return Some(ServerMessage::error("unknown connection", request_id));
            };
            // Acknowledge first so the replayed snapshot follows the ack
            conn_manager.send_to(conn_id, ServerMessage::ack(request_id));
            let subscription = store
                .subscribe(move |records| {
                    let _ = sender.send(ServerMessage::Records {
                        records: records.to_vec(),
                        request_id: None,
                    });
                })
                .await;
            conn_manager.set_subscription(conn_id, subscription);
            return None;
        }

        ClientMessage::Unsubscribe { request_id } => {
            if let Some(subscription) = conn_manager.take_subscription(conn_id) {
                subscription.close();
            }
            ServerMessage::ack(request_id)
        }

        ClientMessage::ListRecords { request_id } => ServerMessage::Records {
            records: handle_list(store),
            request_id,
        },

        ClientMessage::GetRecord { id, request_id } => ServerMessage::Record {
            record: store.get_record(&id),
            request_id,
        },

        ClientMessage::CreateRecord { request_id } => match handle_create(store).await {
            Ok(record) => ServerMessage::Record {
                record: Some(record),
                request_id,
            },
            Err(e) => ServerMessage::error(e.to_string(), request_id),
        },

        ClientMessage::MutateField {
            id,
            change,
            request_id,
        } => match handle_mutate(store, &id, change).await {
            Ok(record) => ServerMessage::Record {
                record: Some(record),
                request_id,
            },
            Err(e) => ServerMessage::error(e.to_string(), request_id),
        },

        ClientMessage::Ping => ServerMessage::Pong,
    };

    Some(response)
}
