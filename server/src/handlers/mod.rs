//! Request handlers shared by the HTTP routes and the WebSocket protocol.

mod batch;
mod records;
mod websocket;

pub use batch::*;
pub use records::*;
pub use websocket::*;
