//! Text encoding for sync messages.
//!
//! Sync messages are opaque bytes produced by automerge. Transports that can
//! only carry text (WebSocket text frames, JSON bodies) exchange them as
//! standard base64.

use automerge::sync;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, Result};

/// Encode raw bytes as standard base64 text.
pub fn bytes_to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64 text back to bytes.
pub fn base64_to_bytes(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| Error::MalformedMessage(format!("invalid base64: {}", e)))
}

/// Encode a sync message for a text channel.
pub fn encode_message(message: sync::Message) -> String {
    bytes_to_base64(&message.encode())
}

/// Decode a sync message received over a text channel.
pub fn decode_message(text: &str) -> Result<sync::Message> {
    let bytes = base64_to_bytes(text)?;
    sync::Message::decode(&bytes).map_err(|e| Error::MalformedMessage(e.to_string()))
}
