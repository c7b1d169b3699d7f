//! # Beanline Engine
//!
//! A replicated catalog of coffee records that any number of peers can read,
//! edit, and converge on without a central arbiter.
//!
//! The merge itself is delegated to [automerge](https://docs.rs/automerge).
//! This crate orchestrates replication around it: the document lifecycle,
//! per-peer sync state, the message drain loop, listener fan-out, and a
//! write-through persistence hook.
//!
//! ## Design Principles
//!
//! - **No IO**: transports and storage are injected as traits
//! - **Convergent**: replicas sharing an ancestor reach the same content
//!   regardless of delivery order or duplication
//! - **Serialized writes, free reads**: every write goes through one async
//!   lock; reads clone a published snapshot
//!
//! ## Core Concepts
//!
//! ### Document
//!
//! A [`Document`] holds a list of [`Record`]s. Each edit is one automerge
//! change, applied through a [`CatalogEditor`].
//!
//! ### Store
//!
//! The [`DocumentStore`] owns the current document. Every accepted change is
//! persisted through the [`PersistHook`], announced to listeners registered
//! with [`DocumentStore::subscribe`], and drained to every peer.
//!
//! ### Sync sessions
//!
//! A peer connects with [`DocumentStore::open_sync_channel`], handing over a
//! [`PeerTransport`] for outgoing messages and getting a [`SyncSession`] for
//! incoming ones. Messages cross text transports as standard base64 (see
//! [`codec`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use beanline_engine::{fixtures, DocumentStore, FieldChange, Replica};
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> beanline_engine::Result<()> {
//! let store = Arc::new(DocumentStore::init(&fixtures::seed_records(), None)?);
//! store
//!     .mutate_field("nebula", FieldChange::Stock { delta: -2 })
//!     .await?;
//!
//! // A replica syncing with the store over two channels.
//! let (to_replica, mut replica_inbox) = mpsc::unbounded_channel::<String>();
//! let (to_store, mut store_inbox) = mpsc::unbounded_channel::<String>();
//! let session = store.open_sync_channel(Arc::new(to_replica)).await;
//! let mut replica = Replica::empty();
//! replica.attach(Arc::new(to_store))?;
//!
//! loop {
//!     let mut moved = false;
//!     while let Ok(message) = replica_inbox.try_recv() {
//!         replica.receive(&message)?;
//!         moved = true;
//!     }
//!     while let Ok(message) = store_inbox.try_recv() {
//!         session.send(Some(message.as_str())).await?;
//!         moved = true;
//!     }
//!     if !moved {
//!         break;
//!     }
//! }
//!
//! assert_eq!(replica.record("nebula").unwrap().stock, 50);
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod document;
pub mod error;
pub mod fixtures;
pub mod generator;
pub mod notifier;
pub mod peer;
pub mod persist;
pub mod record;
pub mod replica;
pub mod session;
pub mod store;

// Re-export main types at crate root
pub use document::{CatalogEditor, Document, RECORDS_KEY};
pub use error::{Error, Result};
pub use notifier::{ChangeNotifier, Listener, Subscription};
pub use peer::{DeliveryError, DrainReport, PeerId, PeerTable, PeerTransport};
pub use persist::{PersistError, PersistFn, PersistHook};
pub use record::{FieldChange, Record, Roast};
pub use replica::Replica;
pub use session::SyncSession;
pub use store::DocumentStore;

/// Identifier of a record within the catalog.
pub type RecordId = String;
