//! Sync transport backed by a WebSocket connection.

use beanline_engine::{DeliveryError, PeerTransport};

use super::{MessageSender, ServerMessage};

/// Wraps each outgoing sync message in a `sync` frame for the socket.
pub struct SocketTransport {
    sender: MessageSender,
}

impl SocketTransport {
    pub fn new(sender: MessageSender) -> Self {
        Self { sender }
    }
}

impl PeerTransport for SocketTransport {
    fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        self.sender
            .send(ServerMessage::Sync {
                message: message.to_string(),
            })
            .map_err(|_| DeliveryError("websocket connection closed".into()))
    }
}
