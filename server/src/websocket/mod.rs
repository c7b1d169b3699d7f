//! WebSocket support for real-time sync.
//!
//! A client opens a sync session over the socket and exchanges automerge sync
//! messages with the store, and can subscribe to catalog snapshots pushed
//! after every accepted change.

mod manager;
mod protocol;
mod transport;

pub use manager::{ConnectionManager, MessageSender};
pub use protocol::*;
pub use transport::SocketTransport;
