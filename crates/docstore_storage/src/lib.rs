//! # DocStore Storage
//!
//! Snapshot storage backends for DocStore.
//!
//! This crate provides the lowest-level storage abstraction for DocStore.
//! A backend holds exactly one **opaque snapshot**: the bytes of the most
//! recently written state. It does not interpret those bytes.
//!
//! ## Design Principles
//!
//! - Backends are simple snapshot stores (read, replace)
//! - `replace` is all-or-nothing: a reader sees the old snapshot or the new
//!   one, never a mix
//! - No knowledge of the DocStore file format
//! - Must be `Send + Sync` so a flush worker thread can own one
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - Persistent storage using a temp file and atomic rename
//!
//! ## Example
//!
//! ```rust
//! use docstore_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.replace(b"hello world").unwrap();
//! assert_eq!(backend.read().unwrap().as_deref(), Some(&b"hello world"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, TEMP_PREFIX};
pub use memory::InMemoryBackend;
