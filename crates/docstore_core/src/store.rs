//! Document store: one named, file-backed collection.

use crate::change_feed::{ChangeEvent, ChangeFeed, FlushFailure};
use crate::config::StoreConfig;
use crate::document::{now_millis, DocId, Document, DocumentMeta, ID_FIELD, META_FIELD};
use crate::error::{CoreError, CoreResult};
use crate::metadata::Metadata;
use crate::persist::format::{self, StoreImage};
use crate::persist::{FlushPhase, Flusher};
use crate::query::{Filter, Query};
use crate::stats::{FlushCounters, FlushStats};
use docstore_storage::{FileBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// In-memory state of a collection.
#[derive(Default)]
struct StoreState {
    documents: HashMap<String, Document>,
    metadata: Metadata,
}

/// State shared between the store handle and its flush worker.
struct StoreShared {
    name: String,
    state: RwLock<StoreState>,
    /// Held for the whole of a write, so writes never overlap.
    backend: Mutex<Box<dyn StorageBackend>>,
    feed: ChangeFeed,
    counters: FlushCounters,
}

impl StoreShared {
    /// Writes the current snapshot and returns the number of bytes written.
    fn write_snapshot(&self) -> CoreResult<usize> {
        let mut backend = self.backend.lock();

        // Capture once; stored values are immutable, so later mutations
        // cannot tear this snapshot.
        let (documents, metadata) = {
            let state = self.state.read();
            (state.documents.clone(), state.metadata.clone())
        };

        let bytes = format::encode(&documents, &metadata)?;
        backend.replace(&bytes)?;

        self.counters.record_flush(bytes.len() as u64);
        debug!(
            "flushed collection {:?} to {} ({} documents, {} bytes)",
            self.name,
            backend.describe(),
            documents.len(),
            bytes.len()
        );
        Ok(bytes.len())
    }

    fn record_failure(&self, err: &CoreError) {
        self.counters.record_failure();
        self.feed.emit_failure(FlushFailure {
            collection: self.name.clone(),
            message: err.to_string(),
        });
    }

    /// Flush job run by the worker thread. Failures cannot reach the caller
    /// that triggered them, so they are logged and published instead.
    fn flush_in_background(&self) {
        if let Err(err) = self.write_snapshot() {
            error!("background flush of collection {:?} failed: {err}", self.name);
            self.record_failure(&err);
        }
    }
}

/// One named collection of JSON documents persisted to a single file.
///
/// All read and write operations work on the in-memory state and return
/// immediately; mutations schedule a debounced flush that a background
/// worker performs later (see [`crate::persist`]). Every document and
/// metadata value handed out is an immutable snapshot.
///
/// # Example
///
/// ```rust,no_run
/// use docstore_core::{DocumentStore, StoreConfig};
/// use serde_json::json;
///
/// let store = DocumentStore::open("todos", StoreConfig::new().path("data"))?;
/// let todo = store.upsert(json!({ "text": "buy milk", "prio": 3 }))?;
/// assert_eq!(todo.meta().unwrap().version, 0);
///
/// let urgent = store.find(&json!({ "prio": { "$gt": 2 } }))?;
/// assert_eq!(urgent.len(), 1);
/// # Ok::<(), docstore_core::CoreError>(())
/// ```
pub struct DocumentStore {
    shared: Arc<StoreShared>,
    path: Option<PathBuf>,
    flusher: Flusher,
}

impl DocumentStore {
    /// Opens the collection `name`, loading its file if there is one.
    ///
    /// The file lives at `config.file_path_for(name)`. A missing or
    /// unreadable file is not an error: the store starts empty and the
    /// problem is logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the file path is unusable or the flush worker
    /// thread cannot be started.
    pub fn open(name: &str, config: StoreConfig) -> CoreResult<Self> {
        let path = config.file_path_for(name);
        let backend = FileBackend::open(&path)?;
        let mut store = Self::open_with_backend(name, Box::new(backend), config.flush_delay)?;
        store.path = Some(path);
        Ok(store)
    }

    /// Opens the collection `name` over an arbitrary storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush worker thread cannot be started.
    pub fn open_with_backend(
        name: &str,
        backend: Box<dyn StorageBackend>,
        flush_delay: Duration,
    ) -> CoreResult<Self> {
        let image = load(name, backend.as_ref());
        let loaded_ids = sorted_ids(image.documents.values());

        let shared = Arc::new(StoreShared {
            name: name.to_string(),
            state: RwLock::new(StoreState {
                documents: image.documents,
                metadata: image.metadata,
            }),
            backend: Mutex::new(backend),
            feed: ChangeFeed::with_initial(ChangeEvent::loaded(loaded_ids)),
            counters: FlushCounters::default(),
        });

        let worker = Arc::clone(&shared);
        let flusher = Flusher::spawn(name, flush_delay, move || worker.flush_in_background())?;

        Ok(Self {
            shared,
            path: None,
            flusher,
        })
    }

    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns the collection file, or `None` for non-file backends.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // === Reads ===

    /// Returns every document, in no particular order.
    #[must_use]
    pub fn find_all(&self) -> Vec<Document> {
        self.shared.state.read().documents.values().cloned().collect()
    }

    /// Returns the documents matching a query document.
    ///
    /// An empty query (`{}`) matches everything.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilter` if the query cannot be compiled.
    pub fn find(&self, query: &Value) -> CoreResult<Vec<Document>> {
        let query = Query::parse(query)?;
        Ok(self.find_with(&query))
    }

    /// Returns the documents accepted by `filter`.
    ///
    /// The filter sees every document of one consistent snapshot.
    pub fn find_with<F: Filter + ?Sized>(&self, filter: &F) -> Vec<Document> {
        self.shared
            .state
            .read()
            .documents
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect()
    }

    /// Returns the document with the given id. Constant time on average.
    pub fn find_one(&self, id: impl Into<DocId>) -> Option<Document> {
        let key = id.into().key();
        self.shared.state.read().documents.get(&key).cloned()
    }

    /// Returns the number of documents.
    #[must_use]
    pub fn count(&self) -> usize {
        self.shared.state.read().documents.len()
    }

    // === Writes ===

    /// Inserts or updates a document.
    ///
    /// `doc` must be a JSON object. Without an `id` (or with `null` or `""`)
    /// a new random id is assigned. If a document with the id exists, the
    /// fields of `doc` are merged over it (top-level keys of `doc` win) and
    /// its version is incremented; otherwise it is inserted with version 0.
    /// The `meta` field is always set by the store.
    ///
    /// Returns the stored snapshot: a following `find_one` with the same id
    /// returns the same allocation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` if `doc` is not an object or its id is
    /// neither a string nor a number.
    pub fn upsert(&self, doc: Value) -> CoreResult<Document> {
        let Value::Object(fields) = doc else {
            return Err(CoreError::invalid_document(format!(
                "document must be a JSON object, got {doc}"
            )));
        };
        let requested = match fields.get(ID_FIELD) {
            Some(value) => DocId::from_value(value)?,
            None => None,
        };

        let now = now_millis();
        let mut state = self.shared.state.write();

        let id = match requested {
            Some(id) => id,
            None => loop {
                let id = DocId::generate();
                if !state.documents.contains_key(&id.key()) {
                    break id;
                }
            },
        };
        let key = id.key();

        let previous = state.documents.get(&key);
        let meta = DocumentMeta::next(previous.and_then(|p| p.get(META_FIELD)), now);
        let mut merged = previous.map(Document::to_map).unwrap_or_default();
        merged.extend(fields);
        merged.insert(META_FIELD.to_string(), meta.to_value());

        let doc = Document::new(id.clone(), merged);
        let event = match state.documents.insert(key, doc.clone()) {
            Some(_) => ChangeEvent::updated(id),
            None => ChangeEvent::created(id),
        };
        self.shared.feed.emit(event);
        drop(state);

        self.request_flush();
        Ok(doc)
    }

    /// Deletes the document with the given id.
    ///
    /// Returns `false`, without scheduling a flush or emitting an event, if
    /// there was no such document.
    pub fn delete(&self, id: impl Into<DocId>) -> bool {
        let key = id.into().key();
        let mut state = self.shared.state.write();

        let Some(removed) = state.documents.remove(&key) else {
            return false;
        };
        self.shared
            .feed
            .emit(ChangeEvent::deleted(vec![removed.id().clone()]));
        drop(state);

        self.request_flush();
        true
    }

    /// Removes every document and resets the collection metadata.
    ///
    /// Emits one `Deleted` event listing every removed id (possibly none).
    /// Always returns `true`.
    pub fn clear(&self) -> bool {
        let mut state = self.shared.state.write();

        let documents = std::mem::take(&mut state.documents);
        state.metadata = Metadata::default();
        let ids = sorted_ids(documents.values());
        self.shared.feed.emit(ChangeEvent::deleted(ids));
        drop(state);

        self.request_flush();
        true
    }

    /// Returns a fresh random id, as assigned by `upsert` to documents
    /// without one.
    #[must_use]
    pub fn gen_id(&self) -> String {
        DocId::generate().key()
    }

    // === Collection metadata ===

    /// Returns the collection metadata.
    #[must_use]
    pub fn meta(&self) -> Metadata {
        self.shared.state.read().metadata.clone()
    }

    /// Returns the metadata value at a dotted path, or `None` if absent.
    #[must_use]
    pub fn meta_get(&self, path: &str) -> Option<Value> {
        self.shared.state.read().metadata.get_path(path).cloned()
    }

    /// Shallow-merges `patch` over the collection metadata.
    ///
    /// Keys in `patch` replace existing ones; other keys are kept. Metadata
    /// changes are not document changes, so no change event is emitted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` if `patch` is not an object.
    pub fn meta_set(&self, patch: Value) -> CoreResult<Metadata> {
        let Value::Object(patch) = patch else {
            return Err(CoreError::invalid_document(format!(
                "metadata patch must be a JSON object, got {patch}"
            )));
        };

        let metadata = {
            let mut state = self.shared.state.write();
            state.metadata = state.metadata.merged(patch);
            state.metadata.clone()
        };

        self.request_flush();
        Ok(metadata)
    }

    // === Notifications ===

    /// Subscribes to change events.
    ///
    /// A subscriber registered before the first mutation receives the
    /// `Loaded` event first.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.shared.feed.subscribe()
    }

    /// Subscribes to background flush failures.
    pub fn subscribe_flush_failures(&self) -> Receiver<FlushFailure> {
        self.shared.feed.subscribe_failures()
    }

    // === Persistence ===

    /// Writes the current state to storage now and waits for the write.
    ///
    /// Supersedes a pending debounced flush. Unlike background flushes,
    /// failures are returned to the caller (and still counted and published).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the storage write fails.
    pub fn flush(&self) -> CoreResult<()> {
        self.flusher.cancel_pending();
        match self.shared.write_snapshot() {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!("flush of collection {:?} failed: {err}", self.shared.name);
                self.shared.record_failure(&err);
                Err(err)
            }
        }
    }

    /// Blocks until no flush is pending or running, or `timeout` elapses.
    ///
    /// Returns `true` if the store is fully flushed (or the last flush
    /// failed; see [`DocumentStore::flush_stats`]).
    pub fn wait_for_flush(&self, timeout: Duration) -> bool {
        self.flusher.wait_idle(timeout)
    }

    /// Returns the scheduling state of the flush worker.
    #[must_use]
    pub fn flush_phase(&self) -> FlushPhase {
        self.flusher.phase()
    }

    /// Returns flush counters.
    #[must_use]
    pub fn flush_stats(&self) -> FlushStats {
        self.shared.counters.snapshot()
    }

    fn request_flush(&self) {
        self.shared.counters.record_request();
        self.flusher.schedule();
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("name", &self.shared.name)
            .field("path", &self.path)
            .field("count", &self.count())
            .finish()
    }
}

/// Ids of `documents`, ordered by key.
fn sorted_ids<'a>(documents: impl Iterator<Item = &'a Document>) -> Vec<DocId> {
    let mut ids: Vec<DocId> = documents.map(|d| d.id().clone()).collect();
    ids.sort_by_cached_key(DocId::key);
    ids
}

/// Loads the initial state. Never fails: anything unreadable yields an
/// empty store.
fn load(name: &str, backend: &dyn StorageBackend) -> StoreImage {
    let bytes = match backend.read() {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!(
                "no file for collection {name:?} at {}; starting empty",
                backend.describe()
            );
            return StoreImage::default();
        }
        Err(err) => {
            warn!(
                "cannot read collection {name:?} from {}: {err}; starting empty",
                backend.describe()
            );
            return StoreImage::default();
        }
    };

    match format::decode(&bytes) {
        Ok(image) => {
            debug!(
                "loaded collection {name:?}: {} documents, format {:?}",
                image.documents.len(),
                image.version
            );
            image
        }
        Err(err) => {
            warn!(
                "cannot decode collection {name:?} from {}: {err}; starting empty",
                backend.describe()
            );
            StoreImage::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_feed::Operation;
    use crate::document::GENERATED_ID_BYTES;
    use docstore_storage::InMemoryBackend;
    use serde_json::json;
    use std::thread;
    use tempfile::tempdir;

    const WAIT: Duration = Duration::from_secs(5);

    fn memory_store(delay: Duration) -> (DocumentStore, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let store =
            DocumentStore::open_with_backend("test", Box::new(backend.clone()), delay).unwrap();
        (store, backend)
    }

    fn stored_value(backend: &InMemoryBackend) -> Value {
        serde_json::from_slice(&backend.data().unwrap()).unwrap()
    }

    #[test]
    fn upsert_find_and_count() {
        let (store, _backend) = memory_store(Duration::from_secs(60));

        store
            .upsert(json!({ "id": 1, "text": "text 1", "prio": 1 }))
            .unwrap();
        store
            .upsert(json!({ "id": 2, "text": "text 2", "prio": 2 }))
            .unwrap();

        let high = store.find(&json!({ "prio": { "$gt": 1 } })).unwrap();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0]["text"], json!("text 2"));
        assert_eq!(store.count(), 2);
        assert_eq!(store.find(&json!({})).unwrap().len(), 2);

        let generated = store.upsert(json!({ "text": "no id" })).unwrap();
        let DocId::Text(id) = generated.id() else {
            panic!("generated id should be text");
        };
        assert_eq!(id.len(), GENERATED_ID_BYTES * 2);
        assert_eq!(generated["id"], json!(id));
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn todo_list_walkthrough() {
        let (store, _backend) = memory_store(Duration::from_secs(60));
        store
            .upsert(json!({ "id": 1, "text": "text 1", "prio": 3 }))
            .unwrap();
        store
            .upsert(json!({ "id": 2, "text": "text 2", "prio": 9 }))
            .unwrap();

        let urgent = store.find(&json!({ "prio": { "$gt": 3 } })).unwrap();
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].id(), &DocId::from(2));
        assert_eq!(store.count(), 2);

        store.upsert(json!({ "text": "new" })).unwrap();
        assert_eq!(store.count(), 3);

        store.meta_set(json!({ "version": 23 })).unwrap();
        assert_eq!(store.meta_get("version"), Some(json!(23)));
        store.meta_set(json!({ "ops": 678 })).unwrap();
        assert_eq!(store.meta_get("version"), Some(json!(23)));
        assert_eq!(store.meta_get("ops"), Some(json!(678)));
    }

    #[test]
    fn upsert_tracks_versions_and_merges() {
        let (store, _backend) = memory_store(Duration::from_secs(60));

        let first = store
            .upsert(json!({ "id": "a", "text": "one", "done": false }))
            .unwrap();
        let meta = first.meta().unwrap();
        assert_eq!(meta.version, 0);
        assert_eq!(meta.created, meta.updated);

        thread::sleep(Duration::from_millis(5));
        let second = store.upsert(json!({ "id": "a", "done": true })).unwrap();
        let next = second.meta().unwrap();

        assert_eq!(next.version, 1);
        assert_eq!(next.created, meta.created);
        assert!(next.updated > meta.updated);
        assert_eq!(second["text"], json!("one"));
        assert_eq!(second["done"], json!(true));

        // The first snapshot is unchanged.
        assert_eq!(first["done"], json!(false));
    }

    #[test]
    fn caller_supplied_meta_is_replaced() {
        let (store, _backend) = memory_store(Duration::from_secs(60));
        let doc = store
            .upsert(json!({ "id": 1, "meta": { "version": 41, "created": 0 } }))
            .unwrap();
        assert_eq!(doc.meta().unwrap().version, 0);
        assert_ne!(doc.meta().unwrap().created, 0);
    }

    #[test]
    fn numeric_and_text_ids_share_a_key() {
        let (store, _backend) = memory_store(Duration::from_secs(60));
        store.upsert(json!({ "id": 7, "v": 1 })).unwrap();
        store.upsert(json!({ "id": "7", "v": 2 })).unwrap();

        assert_eq!(store.count(), 1);
        assert_eq!(store.find_one(7).unwrap()["v"], json!(2));
    }

    #[test]
    fn integral_float_id_addresses_integer_entry() {
        let (store, _backend) = memory_store(Duration::from_secs(60));
        store.upsert(json!({ "id": 1, "v": 1 })).unwrap();
        let doc = store.upsert(json!({ "id": 1.0, "v": 2 })).unwrap();

        assert_eq!(store.count(), 1);
        assert_eq!(doc.meta().unwrap().version, 1);
        assert_eq!(store.find_one(1).unwrap()["v"], json!(2));
    }

    #[test]
    fn meta_get_reaches_keys_containing_dots() {
        let (store, _backend) = memory_store(Duration::from_secs(60));
        store.meta_set(json!({ "a.b": 1 })).unwrap();

        assert_eq!(store.meta_get("a.b"), Some(json!(1)));
    }

    #[test]
    fn returned_document_is_the_stored_snapshot() {
        let (store, _backend) = memory_store(Duration::from_secs(60));
        let doc = store.upsert(json!({ "id": 1, "text": "x" })).unwrap();

        let found = store.find_one(1).unwrap();
        assert!(Document::ptr_eq(&doc, &found));
        assert!(Document::ptr_eq(&doc, &store.find_all()[0]));
    }

    #[test]
    fn rejects_invalid_input() {
        let (store, _backend) = memory_store(Duration::from_secs(60));

        assert!(matches!(
            store.upsert(json!([1, 2])),
            Err(CoreError::InvalidDocument { .. })
        ));
        assert!(matches!(
            store.upsert(json!({ "id": true })),
            Err(CoreError::InvalidDocument { .. })
        ));
        assert!(matches!(
            store.find(&json!({ "prio": { "$near": 1 } })),
            Err(CoreError::InvalidFilter { .. })
        ));
        assert!(matches!(
            store.meta_set(json!("x")),
            Err(CoreError::InvalidDocument { .. })
        ));
        assert_eq!(store.count(), 0);
        assert_eq!(store.flush_stats().requests, 0);
    }

    #[test]
    fn find_with_closure() {
        let (store, _backend) = memory_store(Duration::from_secs(60));
        for i in 0..5 {
            store.upsert(json!({ "id": i, "n": i })).unwrap();
        }

        let even = store.find_with(&|doc: &Document| {
            doc.get("n").and_then(Value::as_i64).is_some_and(|n| n % 2 == 0)
        });
        assert_eq!(even.len(), 3);
    }

    #[test]
    fn delete_and_clear() {
        let (store, _backend) = memory_store(Duration::from_secs(60));
        store.upsert(json!({ "id": 1 })).unwrap();
        store.upsert(json!({ "id": 2 })).unwrap();
        store.meta_set(json!({ "cursor": 5 })).unwrap();
        let requests = store.flush_stats().requests;
        let events = store.subscribe();

        assert!(!store.delete(99));
        assert_eq!(store.flush_stats().requests, requests);
        assert!(events.try_recv().is_err());

        assert!(store.delete(1));
        assert_eq!(store.count(), 1);
        assert_eq!(
            events.try_recv().unwrap(),
            ChangeEvent::deleted(vec![DocId::from(1)])
        );

        assert!(store.clear());
        assert_eq!(store.count(), 0);
        assert!(store.meta().is_empty());
        assert_eq!(
            events.try_recv().unwrap(),
            ChangeEvent::deleted(vec![DocId::from(2)])
        );

        assert!(store.clear());
        assert_eq!(events.try_recv().unwrap(), ChangeEvent::deleted(vec![]));
    }

    #[test]
    fn meta_set_merges_shallowly() {
        let (store, _backend) = memory_store(Duration::from_secs(60));
        let events = store.subscribe();
        assert_eq!(events.try_recv().unwrap().operation, Operation::Loaded);

        store.meta_set(json!({ "a": 23, "nested": { "x": 1 } })).unwrap();
        let meta = store
            .meta_set(json!({ "b": 678, "nested": { "y": 2 } }))
            .unwrap();

        assert_eq!(meta["a"], json!(23));
        assert_eq!(meta["b"], json!(678));
        assert_eq!(meta["nested"], json!({ "y": 2 }));
        assert_eq!(store.meta_get("nested.y"), Some(json!(2)));
        assert_eq!(store.meta_get("nested.x"), None);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn events_follow_mutation_order() {
        let (store, _backend) = memory_store(Duration::from_secs(60));
        let events = store.subscribe();

        store.upsert(json!({ "id": 1 })).unwrap();
        store.upsert(json!({ "id": 1 })).unwrap();
        store.delete(1);

        let ops: Vec<_> = events.try_iter().map(|e| e.operation).collect();
        assert_eq!(
            ops,
            vec![
                Operation::Loaded,
                Operation::Created,
                Operation::Updated,
                Operation::Deleted
            ]
        );

        // Late subscribers do not see the load.
        let late = store.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn loaded_event_lists_existing_documents() {
        let backend = InMemoryBackend::with_data(
            json!({ "1": { "id": 1 }, "2": { "id": 2 } }).to_string(),
        );
        let store =
            DocumentStore::open_with_backend("test", Box::new(backend), Duration::ZERO).unwrap();

        let event = store.subscribe().try_recv().unwrap();
        assert_eq!(event, ChangeEvent::loaded(vec![DocId::from(1), DocId::from(2)]));
    }

    #[test]
    fn burst_of_writes_flushes_once() {
        let (store, backend) = memory_store(Duration::from_millis(100));

        store.upsert(json!({ "id": 1 })).unwrap();
        store.upsert(json!({ "id": 2 })).unwrap();
        store.upsert(json!({ "id": 3 })).unwrap();
        assert_eq!(backend.write_count(), 0);

        assert!(store.wait_for_flush(WAIT));
        assert_eq!(backend.write_count(), 1);
        assert_eq!(stored_value(&backend)["storeData"].as_object().unwrap().len(), 3);

        let stats = store.flush_stats();
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.flushes, 1);
        assert!(stats.bytes_written > 0);
    }

    #[test]
    fn explicit_flush_supersedes_pending() {
        let (store, backend) = memory_store(Duration::from_secs(60));
        store.upsert(json!({ "id": 1 })).unwrap();
        assert_eq!(store.flush_phase(), FlushPhase::Armed);

        store.flush().unwrap();

        assert_eq!(store.flush_phase(), FlushPhase::Idle);
        assert_eq!(backend.write_count(), 1);
        drop(store);
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn drop_writes_pending_changes() {
        let (store, backend) = memory_store(Duration::from_secs(60));
        store.upsert(json!({ "id": 1, "text": "late" })).unwrap();
        drop(store);

        assert_eq!(backend.write_count(), 1);
        assert_eq!(
            stored_value(&backend)["storeData"]["1"]["text"],
            json!("late")
        );
    }

    #[test]
    fn failed_flush_is_reported() {
        let (store, backend) = memory_store(Duration::ZERO);
        let failures = store.subscribe_flush_failures();
        backend.set_fail_writes(true);

        store.upsert(json!({ "id": 1 })).unwrap();
        let failure = failures.recv_timeout(WAIT).unwrap();
        assert_eq!(failure.collection, "test");
        assert!(store.wait_for_flush(WAIT));
        assert_eq!(store.flush_stats().failures, 1);

        assert!(store.flush().is_err());
        assert_eq!(store.flush_stats().failures, 2);

        // Data stays in memory and is written once storage recovers.
        backend.set_fail_writes(false);
        store.flush().unwrap();
        assert_eq!(stored_value(&backend)["storeData"]["1"]["id"], json!(1));
    }

    #[test]
    fn reopen_restores_documents_and_metadata() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::new().path(dir.path()).immediate();

        {
            let store = DocumentStore::open("Todo Items", config.clone()).unwrap();
            store.upsert(json!({ "id": 1, "text": "a" })).unwrap();
            store.upsert(json!({ "id": "b", "text": "b" })).unwrap();
            store.meta_set(json!({ "synced": 42 })).unwrap();
        }

        let path = dir.path().join("todo-items.json");
        assert!(path.exists());

        let store = DocumentStore::open("Todo Items", config).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.count(), 2);
        assert_eq!(store.find_one(1).unwrap()["text"], json!("a"));
        assert_eq!(store.find_one("b").unwrap().meta().unwrap().version, 0);
        assert_eq!(store.meta_get("synced"), Some(json!(42)));
    }

    #[test]
    fn loads_legacy_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("legacy.json"),
            json!({
                "1": { "id": 1, "text": "text 1" },
                "2": { "id": 2, "text": "text 2" }
            })
            .to_string(),
        )
        .unwrap();

        let store = DocumentStore::open("legacy", StoreConfig::new().path(dir.path())).unwrap();

        assert_eq!(store.count(), 2);
        assert!(store.meta().is_empty());

        store.flush().unwrap();
        let written: Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("legacy.json")).unwrap())
                .unwrap();
        assert_eq!(written["__version__"], json!(1));
        assert_eq!(written["storeData"]["2"]["text"], json!("text 2"));
    }

    #[test]
    fn unreadable_file_loads_empty() {
        for contents in ["{ not json", "[1, 2, 3]", r#"{ "__version__": 99 }"#] {
            let backend = InMemoryBackend::with_data(contents);
            let store =
                DocumentStore::open_with_backend("test", Box::new(backend), Duration::ZERO)
                    .unwrap();
            assert_eq!(store.count(), 0, "contents: {contents}");
            assert!(store.meta().is_empty());
        }
    }

    #[test]
    fn concurrent_upserts_are_all_kept() {
        let (store, backend) = memory_store(Duration::from_millis(10));
        let store = Arc::new(store);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..25 {
                        store.upsert(json!({ "id": t * 100 + i })).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count(), 100);
        store.flush().unwrap();
        assert_eq!(stored_value(&backend)["storeData"].as_object().unwrap().len(), 100);
    }
}
