//! Collection registry.
//!
//! A [`Registry`] hands out one [`DocumentStore`] per collection file, all
//! stored under the same directory with the same flush delay. Stores are
//! opened on first access and cached for the registry's lifetime. Names
//! that slug to the same file (`"Todo Items"`, `"todo-items"`) share one
//! store, so two stores never write the same file.
//!
//! ```rust,no_run
//! use docstore_core::{Registry, StoreConfig};
//! use serde_json::json;
//!
//! let registry = Registry::new(StoreConfig::new().path("data"));
//! let todos = registry.collection("todos")?;
//! todos.upsert(json!({ "text": "write docs" }))?;
//!
//! assert_eq!(registry.list_collections(), vec!["todos".to_string()]);
//! # Ok::<(), docstore_core::CoreError>(())
//! ```

use crate::config::StoreConfig;
use crate::error::CoreResult;
use crate::store::DocumentStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Lazily opened, cached collections sharing one configuration.
pub struct Registry {
    config: StoreConfig,
    /// Keyed by resolved file path.
    collections: RwLock<BTreeMap<PathBuf, Arc<DocumentStore>>>,
}

impl Registry {
    /// Creates a registry. No collection is opened until requested.
    ///
    /// Collection files are named after the collection, so an explicit
    /// `filename` in `config` is ignored.
    #[must_use]
    pub fn new(mut config: StoreConfig) -> Self {
        config.filename = None;
        Self {
            config,
            collections: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the shared configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the collection `name`, opening it on first access.
    ///
    /// A name whose file is already open returns that store, which keeps
    /// the name it was first opened with.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection has to be opened and opening fails.
    pub fn collection(&self, name: &str) -> CoreResult<Arc<DocumentStore>> {
        let path = self.config.file_path_for(name);
        if let Some(store) = self.collections.read().get(&path) {
            return Ok(Arc::clone(store));
        }

        let mut collections = self.collections.write();
        // Another thread may have opened it between the two locks.
        if let Some(store) = collections.get(&path) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(DocumentStore::open(name, self.config.clone())?);
        debug!("opened collection {name:?} at {}", path.display());
        collections.insert(path, Arc::clone(&store));
        Ok(store)
    }

    /// Returns the names of the collections opened through this registry,
    /// in sorted order. Each open file is listed once, under the name it
    /// was first opened with.
    ///
    /// Collections that exist on disk but were never requested are not
    /// listed.
    #[must_use]
    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .values()
            .map(|store| store.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Flushes every open collection now.
    ///
    /// All collections are attempted even if one fails.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn flush_all(&self) -> CoreResult<()> {
        let stores: Vec<Arc<DocumentStore>> = self.collections.read().values().cloned().collect();

        let mut first_error = None;
        for store in stores {
            if let Err(err) = store.flush() {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("collections", &self.list_collections())
            .finish()
    }
}
