//! Fan-out of snapshot changes to local listeners.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::record::Record;

/// Callback receiving a full snapshot of the records.
pub type Listener = Arc<dyn Fn(&[Record]) + Send + Sync>;

type ListenerMap = Mutex<BTreeMap<u64, Listener>>;

/// Set of listeners notified with the same snapshot value.
///
/// The listener map is only locked while copying it, never while a listener
/// runs, so listeners may subscribe or unsubscribe from inside a callback.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Arc<ListenerMap>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener without invoking it.
    pub fn register(&self, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).insert(id, listener);
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
            closed: AtomicBool::new(false),
        }
    }

    /// Call every registered listener with `snapshot`.
    pub fn notify(&self, snapshot: &[Record]) {
        let listeners: Vec<Listener> = lock(&self.listeners).values().cloned().collect();
        for listener in listeners {
            listener(snapshot);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for a registered listener.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::close`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerMap>,
    closed: AtomicBool,
}

impl Subscription {
    /// Unregister the listener. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).remove(&self.id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// A listener panicking while the map is copied cannot leave it inconsistent.
fn lock(listeners: &ListenerMap) -> std::sync::MutexGuard<'_, BTreeMap<u64, Listener>> {
    listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
