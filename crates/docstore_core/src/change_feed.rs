//! Change feed for observing store mutations.
//!
//! The change feed emits one event per mutating operation, enabling:
//! - Cache invalidation
//! - Sync layer integration
//! - Reactive UI updates
//!
//! # Usage
//!
//! ```rust,ignore
//! use docstore_core::{DocumentStore, Operation, StoreConfig};
//!
//! let store = DocumentStore::open("todos", StoreConfig::new())?;
//! let receiver = store.subscribe();
//!
//! // The first event is always the initial load.
//! let loaded = receiver.recv()?;
//! assert_eq!(loaded.operation, Operation::Loaded);
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = receiver.recv() {
//!         println!("{:?} {:?}", event.operation, event.ids);
//!     }
//! });
//! ```
//!
//! # Delivery
//!
//! Events are queued on each subscriber's channel and consumed on the
//! subscriber's own schedule. The `Loaded` event is not sent while the store
//! is being opened, since nobody can be subscribed yet. Instead it is held
//! back and handed to every subscriber that registers before the first
//! mutation; the first mutation retires it.

use crate::document::DocId;
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

/// Kind of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// The store finished loading its file. Emitted once per store.
    Loaded,
    /// A document was inserted (no document with its id existed).
    Created,
    /// An existing document was replaced.
    Updated,
    /// Documents were removed, by `delete` or `clear`.
    Deleted,
}

/// A single change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened.
    pub operation: Operation,
    /// The affected documents.
    pub ids: Vec<DocId>,
}

impl ChangeEvent {
    /// Creates a loaded event listing every document present after load.
    pub fn loaded(ids: Vec<DocId>) -> Self {
        Self {
            operation: Operation::Loaded,
            ids,
        }
    }

    /// Creates a created event.
    pub fn created(id: DocId) -> Self {
        Self {
            operation: Operation::Created,
            ids: vec![id],
        }
    }

    /// Creates an updated event.
    pub fn updated(id: DocId) -> Self {
        Self {
            operation: Operation::Updated,
            ids: vec![id],
        }
    }

    /// Creates a deleted event.
    pub fn deleted(ids: Vec<DocId>) -> Self {
        Self {
            operation: Operation::Deleted,
            ids,
        }
    }
}

/// Report of a background flush that could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushFailure {
    /// Name of the collection whose flush failed.
    pub collection: String,
    /// Rendered error.
    pub message: String,
}

struct FeedState {
    subscribers: Vec<Sender<ChangeEvent>>,
    /// The `Loaded` event, until the first mutation event retires it.
    initial: Option<ChangeEvent>,
}

/// A change feed that distributes store mutations to subscribers.
///
/// The change feed:
/// - Preserves mutation order
/// - Supports multiple subscribers
/// - Prunes subscribers whose receiver was dropped
/// - Is thread-safe
pub struct ChangeFeed {
    state: Mutex<FeedState>,
    failure_subscribers: Mutex<Vec<Sender<FlushFailure>>>,
}

impl ChangeFeed {
    /// Creates a change feed whose first event is `initial`.
    ///
    /// `initial` is delivered lazily, see the module documentation.
    pub fn with_initial(initial: ChangeEvent) -> Self {
        Self {
            state: Mutex::new(FeedState {
                subscribers: Vec::new(),
                initial: Some(initial),
            }),
            failure_subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Subscribes to the change feed.
    ///
    /// Returns a receiver for all future change events, preceded by the
    /// initial event if no mutation happened yet.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        let mut state = self.state.lock();
        if let Some(initial) = &state.initial {
            // The receiver is alive, so this cannot fail.
            let _ = tx.send(initial.clone());
        }
        state.subscribers.push(tx);
        rx
    }

    /// Emits a change event to all subscribers.
    pub fn emit(&self, event: ChangeEvent) {
        let mut state = self.state.lock();
        state.initial = None;
        state.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Subscribes to background flush failures.
    pub fn subscribe_failures(&self) -> Receiver<FlushFailure> {
        let (tx, rx) = mpsc::channel();
        self.failure_subscribers.lock().push(tx);
        rx
    }

    /// Publishes a flush failure.
    pub fn emit_failure(&self, failure: FlushFailure) {
        self.failure_subscribers
            .lock()
            .retain(|tx| tx.send(failure.clone()).is_ok());
    }

    /// Returns the number of active change subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Returns `true` while the initial event is still held back.
    pub fn has_pending_initial(&self) -> bool {
        self.state.lock().initial.is_some()
    }
}
