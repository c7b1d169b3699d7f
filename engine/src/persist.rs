//! Write-through persistence of the serialized document.

use std::future::Future;

use async_trait::async_trait;

/// The persistence hook rejected a write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PersistError(pub String);

impl From<PersistError> for crate::Error {
    fn from(err: PersistError) -> Self {
        crate::Error::Persistence(err.0)
    }
}

/// Receives the full serialized document after every accepted change.
///
/// The store awaits the hook before the mutating call returns. A failure is
/// reported to that caller, but the in-memory document is not rolled back.
#[async_trait]
pub trait PersistHook: Send + Sync {
    async fn persist(&self, bytes: Vec<u8>) -> Result<(), PersistError>;
}

/// Adapter turning an async closure into a [`PersistHook`].
pub struct PersistFn<F>(pub F);

#[async_trait]
impl<F, Fut> PersistHook for PersistFn<F>
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), PersistError>> + Send,
{
    async fn persist(&self, bytes: Vec<u8>) -> Result<(), PersistError> {
        (self.0)(bytes).await
    }
}
