//! Flush statistics.
//!
//! Counters describing how the persistence engine has behaved so far:
//! how many flushes were requested, how many actually reached storage,
//! and how many failed.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = DocumentStore::open("todos", StoreConfig::new())?;
//! store.upsert(json!({ "text": "buy milk" }))?;
//! store.flush()?;
//!
//! let stats = store.flush_stats();
//! println!("Flushes: {}", stats.flushes);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Live flush counters.
///
/// All counters are atomic and can be read while a flush is in progress.
#[derive(Debug, Default)]
pub(crate) struct FlushCounters {
    /// Number of flush requests (one per mutation).
    requests: AtomicU64,
    /// Number of snapshots written to storage.
    flushes: AtomicU64,
    /// Number of failed writes.
    failures: AtomicU64,
    /// Total bytes written.
    bytes_written: AtomicU64,
}

impl FlushCounters {
    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, bytes: u64) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> FlushStats {
        FlushStats {
            requests: self.requests.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of flush statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushStats {
    /// Number of flush requests made by mutations.
    ///
    /// Requests inside one debounce window collapse into a single flush,
    /// so this is usually larger than `flushes`.
    pub requests: u64,
    /// Number of snapshots successfully written to storage.
    pub flushes: u64,
    /// Number of failed writes.
    pub failures: u64,
    /// Total bytes written by successful flushes.
    pub bytes_written: u64,
}
