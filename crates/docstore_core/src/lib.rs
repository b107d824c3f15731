//! # Docstore Core
//!
//! Embedded JSON document store.
//!
//! This crate provides:
//! - Named collections of JSON documents held in memory
//! - Debounced, atomic persistence of each collection to one JSON file
//! - Query documents (`$gt`, `$in`, `$or`, ...) and closure filters
//! - Per-document metadata (`created`, `updated`, `version`)
//! - Collection-level metadata
//! - A change feed for observing mutations
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docstore_core::{Registry, StoreConfig};
//! use serde_json::json;
//!
//! let registry = Registry::new(StoreConfig::new().path("data"));
//! let expenses = registry.collection("expenses")?;
//!
//! expenses.upsert(json!({ "id": 1, "amount": 12.5, "tags": ["food"] }))?;
//! let food = expenses.find(&json!({ "tags": "food" }))?;
//! assert_eq!(food.len(), 1);
//!
//! expenses.flush()?;
//! # Ok::<(), docstore_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod config;
mod document;
mod error;
mod metadata;
mod path;
pub mod persist;
mod query;
mod registry;
mod stats;
mod store;

pub use change_feed::{ChangeEvent, ChangeFeed, FlushFailure, Operation};
pub use config::{slug, StoreConfig, DEFAULT_DIR, DEFAULT_FLUSH_DELAY};
pub use document::{
    now_millis, DocId, Document, DocumentMeta, GENERATED_ID_BYTES, ID_FIELD, META_FIELD,
};
pub use error::{CoreError, CoreResult};
pub use metadata::Metadata;
pub use persist::FlushPhase;
pub use query::{Filter, Query};
pub use registry::Registry;
pub use stats::FlushStats;
pub use store::DocumentStore;
