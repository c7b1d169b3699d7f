//! Error types for the Beanline engine.

use crate::RecordId;
use thiserror::Error;

/// All possible errors from the Beanline engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Document errors
    #[error("corrupt document: {0}")]
    CorruptDocument(String),

    #[error("malformed sync message: {0}")]
    MalformedMessage(String),

    #[error("crdt operation failed: {0}")]
    Crdt(String),

    // Record errors
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("record already exists: {0}")]
    RecordAlreadyExists(RecordId),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    // Collaborator errors
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("not connected: no active sync session")]
    NotConnected,
}

impl From<automerge::AutomergeError> for Error {
    fn from(err: automerge::AutomergeError) -> Self {
        Error::Crdt(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::RecordNotFound("andromeda".into());
        assert_eq!(err.to_string(), "record not found: andromeda");

        let err = Error::CorruptDocument("bad header".into());
        assert_eq!(err.to_string(), "corrupt document: bad header");

        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "not connected: no active sync session");
    }
}
