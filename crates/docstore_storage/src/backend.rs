//! Storage backend trait definition.

use crate::error::StorageResult;

/// A snapshot storage backend for DocStore.
///
/// A backend holds at most one snapshot: an opaque byte string written as a
/// whole. DocStore owns all interpretation of those bytes.
///
/// # Invariants
///
/// - `read` returns `None` until the first successful `replace`
/// - after `replace` returns `Ok`, `read` returns exactly the bytes written
/// - a failed or interrupted `replace` leaves the previous snapshot intact
/// - Backends must be `Send + Sync` so a background flush thread can own them
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads the current snapshot.
    ///
    /// Returns `Ok(None)` if nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    fn read(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically replaces the snapshot with `data`.
    ///
    /// After this returns successfully the new snapshot is durable and
    /// survives process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. The previous snapshot is kept.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Returns a human-readable description of where the snapshot lives.
    ///
    /// Used in log messages only.
    fn describe(&self) -> String;
}
