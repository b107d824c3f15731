//! Collection-level metadata.

use crate::path;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// Arbitrary user data scoped to a whole collection (schema version, sync
/// cursors, ...), persisted together with the documents.
///
/// Like [`crate::Document`], this is an immutable snapshot: `meta_set`
/// builds a new value rather than editing the current one.
#[derive(Clone, PartialEq, Default)]
pub struct Metadata {
    fields: Arc<Map<String, Value>>,
}

impl Metadata {
    pub(crate) fn from_map(fields: Map<String, Value>) -> Self {
        Self {
            fields: Arc::new(fields),
        }
    }

    /// Returns a new snapshot with `patch` shallow-merged over this one.
    ///
    /// Keys in `patch` replace existing keys; all other keys are kept.
    #[must_use]
    pub(crate) fn merged(&self, patch: Map<String, Value>) -> Self {
        let mut fields = (*self.fields).clone();
        fields.extend(patch);
        Self::from_map(fields)
    }

    /// Returns a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the value at a dotted path such as `"sync.cursor"`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path::lookup(&self.fields, path)
    }

    /// Returns `true` if no key is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of top-level keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns a read-only view of all keys.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns an owned, editable copy.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        (*self.fields).clone()
    }

    /// Returns an owned copy as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }
}

impl Index<&str> for Metadata {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.get(key).unwrap_or(&NULL)
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Metadata").field(&*self.fields).finish()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn default_is_empty() {
        let meta = Metadata::default();
        assert!(meta.is_empty());
        assert_eq!(meta.len(), 0);
        assert_eq!(meta.to_value(), json!({}));
    }

    #[test]
    fn merged_is_shallow_and_non_destructive() {
        let meta = Metadata::from_map(map(json!({ "version": 23, "sync": { "a": 1 } })));
        let next = meta.merged(map(json!({ "ops": 678, "sync": { "b": 2 } })));

        assert_eq!(next["version"], json!(23));
        assert_eq!(next["ops"], json!(678));
        assert_eq!(next["sync"], json!({ "b": 2 }));

        // The original snapshot is untouched.
        assert!(meta.get("ops").is_none());
        assert_eq!(meta["sync"], json!({ "a": 1 }));
    }

    #[test]
    fn nested_lookup() {
        let meta = Metadata::from_map(map(json!({ "sync": { "cursor": 9 } })));
        assert_eq!(meta.get_path("sync.cursor"), Some(&json!(9)));
        assert_eq!(meta.get_path("sync.missing"), None);
    }
}
