//! Documents and their identifiers.
//!
//! A [`Document`] is an immutable snapshot. The store builds a fresh one on
//! every upsert and never changes it afterwards; handles given to callers
//! share the same allocation and expose read-only accessors only. To change
//! a document, copy its fields with [`Document::to_map`], edit the copy and
//! upsert it.

mod id;
mod meta;

pub use id::{DocId, GENERATED_ID_BYTES};
pub use meta::{now_millis, DocumentMeta, META_FIELD};

use crate::path;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// Field name holding the document id.
pub const ID_FIELD: &str = "id";

#[derive(PartialEq)]
struct DocumentInner {
    id: DocId,
    fields: Map<String, Value>,
}

/// An immutable document snapshot.
///
/// Cloning is cheap and yields a handle to the same snapshot, which can be
/// checked with [`Document::ptr_eq`].
#[derive(Clone, PartialEq)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    /// Builds a snapshot from an id and its fields.
    ///
    /// The `id` field is overwritten with `id` so the two never disagree.
    pub(crate) fn new(id: DocId, mut fields: Map<String, Value>) -> Self {
        fields.insert(ID_FIELD.to_string(), id.to_value());
        Self {
            inner: Arc::new(DocumentInner { id, fields }),
        }
    }

    /// Builds a snapshot for an entry loaded from disk under `key`.
    ///
    /// The stored `id` field is authoritative; entries without a usable id
    /// take the key they were stored under.
    pub(crate) fn from_stored(key: &str, fields: Map<String, Value>) -> Self {
        let id = fields
            .get(ID_FIELD)
            .and_then(|v| DocId::from_value(v).ok().flatten())
            .unwrap_or_else(|| DocId::from(key));
        Self::new(id, fields)
    }

    /// Returns the document id.
    #[must_use]
    pub fn id(&self) -> &DocId {
        &self.inner.id
    }

    /// Returns a top-level field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.inner.fields.get(field)
    }

    /// Returns the value at a dotted path such as `"author.name"`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path::lookup(&self.inner.fields, path)
    }

    /// Returns the timestamps and version, if the document carries them.
    ///
    /// Every document written through `upsert` does; entries loaded from a
    /// file written by other tools might not.
    #[must_use]
    pub fn meta(&self) -> Option<DocumentMeta> {
        self.get(META_FIELD).and_then(DocumentMeta::from_value)
    }

    /// Returns a read-only view of all fields, including `id` and `meta`.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.inner.fields
    }

    /// Returns an owned, editable copy of all fields.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        self.inner.fields.clone()
    }

    /// Returns an owned copy of the document as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// Returns `true` if both handles point to the same snapshot.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl Index<&str> for Document {
    type Output = Value;

    /// Returns the field, or `Value::Null` if it is absent.
    fn index(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.get(field).unwrap_or(&NULL)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.inner.id)
            .field("fields", &self.inner.fields)
            .finish()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.fields.serialize(serializer)
    }
}
