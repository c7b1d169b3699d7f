//! Keyed byte storage for serialized documents.

mod documents;
mod pool;

pub use documents::*;
pub use pool::*;
