//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and use snake_case for field names.

use beanline_engine::{FieldChange, Record};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a sync session on this connection, replacing any open one.
    OpenSync {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// One base64 sync message, or `null` as a keepalive.
    Sync {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Close the connection's sync session.
    CloseSync {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Receive a `records` push now and after every change.
    Subscribe {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Stop receiving `records` pushes.
    Unsubscribe {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Request the full catalog.
    ListRecords {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Request one record.
    GetRecord {
        id: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Insert a generated record.
    CreateRecord {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Apply one field change to a record.
    MutateField {
        id: String,
        change: FieldChange,
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Outgoing sync message from the store.
    Sync { message: String },

    /// Catalog snapshot, either requested or pushed to a subscriber.
    Records {
        records: Vec<Record>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// A single record; `null` when the id is unknown.
    Record {
        record: Option<Record>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Request accepted with nothing else to return.
    Ack {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    pub fn ack(request_id: Option<String>) -> Self {
        ServerMessage::Ack { request_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_deserialization() {
        let json = r#"{"type": "sync", "message": "AEI=", "request_id": "r1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Sync {
                message,
                request_id,
            } => {
                assert_eq!(message.as_deref(), Some("AEI="));
                assert_eq!(request_id.as_deref(), Some("r1"));
            }
            _ => panic!("Expected Sync message"),
        }

        let json = r#"{"type": "sync", "message": null}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Sync { message: None, .. }));

        let json = r#"{"type": "ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_mutate_field_deserialization() {
        let json = r#"{"type": "mutate_field", "id": "nebula", "change": {"field": "stock", "delta": -3}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::MutateField { id, change, .. } => {
                assert_eq!(id, "nebula");
                assert_eq!(change, FieldChange::Stock { delta: -3 });
            }
            _ => panic!("Expected MutateField message"),
        }
    }

    #[test]
    fn test_server_message_serialization() {
        let msg = ServerMessage::Pong;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);

        let msg = ServerMessage::ack(None);
        assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"type":"ack"}"#);

        let msg = ServerMessage::error("test error", Some("req-1".to_string()));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""message":"test error""#));
        assert!(json.contains(r#""request_id":"req-1""#));
    }
}
