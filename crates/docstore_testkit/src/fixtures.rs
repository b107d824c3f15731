//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use docstore_core::{DocumentStore, StoreConfig};
use docstore_storage::InMemoryBackend;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Collection name used by the helpers that do not take one.
pub const TEST_COLLECTION: &str = "test";

enum Source {
    File { dir: TempDir, config: StoreConfig },
    Memory(InMemoryBackend),
}

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: DocumentStore,
    name: String,
    source: Source,
}

impl TestStore {
    /// Creates a store over a fresh temporary directory.
    ///
    /// The flush delay is zero so writes reach the file quickly.
    pub fn file(name: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let config = StoreConfig::new().path(dir.path()).immediate();
        Self::file_with_config(name, dir, config)
    }

    /// Creates a store in `dir` with the given config.
    ///
    /// The config's path is replaced with `dir`.
    pub fn file_with_config(name: &str, dir: TempDir, config: StoreConfig) -> Self {
        let config = config.path(dir.path());
        let store = DocumentStore::open(name, config.clone()).expect("Failed to open file store");
        Self {
            store,
            name: name.to_string(),
            source: Source::File { dir, config },
        }
    }

    /// Creates a store over an in-memory backend.
    pub fn memory(name: &str, flush_delay: Duration) -> Self {
        Self::memory_with_backend(name, InMemoryBackend::new(), flush_delay)
    }

    /// Creates a store over `backend`, which may already hold a file image.
    pub fn memory_with_backend(name: &str, backend: InMemoryBackend, flush_delay: Duration) -> Self {
        let store = DocumentStore::open_with_backend(name, Box::new(backend.clone()), flush_delay)
            .expect("Failed to open in-memory store");
        Self {
            store,
            name: name.to_string(),
            source: Source::Memory(backend),
        }
    }

    /// Returns the temporary directory, if file-based.
    pub fn dir(&self) -> Option<&Path> {
        match &self.source {
            Source::File { dir, .. } => Some(dir.path()),
            Source::Memory(_) => None,
        }
    }

    /// Returns the collection file, if file-based.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.store.path().map(Path::to_path_buf)
    }

    /// Returns the in-memory backend, if memory-based.
    pub fn backend(&self) -> Option<&InMemoryBackend> {
        match &self.source {
            Source::Memory(backend) => Some(backend),
            Source::File { .. } => None,
        }
    }

    /// Closes the store, which writes pending changes, and opens it again
    /// from the same storage.
    pub fn reopen(self) -> Self {
        let Self {
            store,
            name,
            source,
        } = self;
        let flush_delay = match &source {
            Source::File { config, .. } => config.flush_delay,
            Source::Memory(_) => Duration::ZERO,
        };
        drop(store);

        match source {
            Source::File { dir, config } => Self::file_with_config(&name, dir, config),
            Source::Memory(backend) => Self::memory_with_backend(&name, backend, flush_delay),
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = DocumentStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary file-based store.
///
/// # Example
///
/// ```rust,ignore
/// use docstore_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         store.upsert(serde_json::json!({ "id": 1 })).unwrap();
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&DocumentStore) -> R,
{
    let test_store = TestStore::file(TEST_COLLECTION);
    f(&test_store.store)
}

/// Runs a test with a store over an in-memory backend that never flushes
/// on its own.
pub fn with_memory_store<F, R>(f: F) -> R
where
    F: FnOnce(&DocumentStore, &InMemoryBackend) -> R,
{
    let test_store = TestStore::memory(TEST_COLLECTION, Duration::from_secs(3600));
    let backend = test_store.backend().cloned().expect("Memory store has a backend");
    f(&test_store.store, &backend)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use serde_json::json;

    /// Creates a file store holding `count` documents with ids `0..count`
    /// and fields `n` (the index) and `even`.
    pub fn populated_store(count: usize) -> TestStore {
        let test_store = TestStore::file(TEST_COLLECTION);
        for i in 0..count {
            test_store
                .upsert(json!({ "id": i, "n": i, "even": i % 2 == 0 }))
                .expect("Failed to upsert document");
        }
        test_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_store() {
        let test_store = TestStore::file("notes");
        assert_eq!(test_store.name(), "notes");
        assert_eq!(
            test_store.file_path(),
            Some(test_store.dir().unwrap().join("notes.json"))
        );
    }

    #[test]
    fn test_with_temp_store() {
        with_temp_store(|store| {
            store.upsert(json!({ "id": 1 })).unwrap();
            assert_eq!(store.count(), 1);
        });
    }

    #[test]
    fn test_reopen_file_store() {
        let test_store = TestStore::file("notes");
        test_store.upsert(json!({ "id": 1, "text": "kept" })).unwrap();

        let test_store = test_store.reopen();
        assert_eq!(test_store.find_one(1).unwrap()["text"], json!("kept"));
    }

    #[test]
    fn test_reopen_memory_store() {
        let test_store = TestStore::memory("notes", Duration::from_secs(3600));
        test_store.upsert(json!({ "id": 1 })).unwrap();

        let test_store = test_store.reopen();
        assert_eq!(test_store.count(), 1);
        assert_eq!(test_store.backend().unwrap().write_count(), 1);
    }

    #[test]
    fn test_populated_scenario() {
        let test_store = scenarios::populated_store(10);
        assert_eq!(test_store.count(), 10);
        assert_eq!(test_store.find(&json!({ "even": true })).unwrap().len(), 5);
    }
}
