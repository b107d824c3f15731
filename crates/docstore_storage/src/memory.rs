//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryState {
    data: Option<Vec<u8>>,
    writes: u64,
    fail_writes: bool,
}

/// An in-memory storage backend.
///
/// This backend keeps the snapshot in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// Clones share the same underlying snapshot, so a test can keep a handle
/// after moving the backend into a store and inspect what was written.
///
/// # Example
///
/// ```rust
/// use docstore_storage::{StorageBackend, InMemoryBackend};
///
/// let probe = InMemoryBackend::new();
/// let mut backend = probe.clone();
/// backend.replace(b"test data").unwrap();
/// assert_eq!(probe.write_count(), 1);
/// assert_eq!(probe.data().unwrap(), b"test data");
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with a pre-existing snapshot.
    ///
    /// Useful for testing load and recovery paths.
    #[must_use]
    pub fn with_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState {
                data: Some(data.into()),
                ..MemoryState::default()
            })),
        }
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn data(&self) -> Option<Vec<u8>> {
        self.state.read().data.clone()
    }

    /// Returns how many successful `replace` calls have happened.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.state.read().writes
    }

    /// Makes every following `replace` fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.write().fail_writes = fail;
    }
}

impl StorageBackend for InMemoryBackend {
    fn read(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.state.read().data.clone())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.fail_writes {
            return Err(StorageError::InjectedFailure(
                "in-memory backend is set to fail writes".to_string(),
            ));
        }
        state.data = Some(data.to_vec());
        state.writes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}
