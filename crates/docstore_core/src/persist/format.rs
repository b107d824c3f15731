//! On-disk file format.
//!
//! Two layouts are understood:
//!
//! ```text
//! legacy      { "<id>": { ...document... }, ... }
//! version 1   { "__version__": 1,
//!               "storeData": { "<id>": { ...document... }, ... },
//!               "metaData":  { ...collection metadata... } }
//! ```
//!
//! Writers always produce version 1. The legacy layout is a bare id to
//! document mapping without collection metadata.

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::metadata::Metadata;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Newest file format version this build reads and the one it writes.
pub const FILE_VERSION: u64 = 1;

/// Key holding the format version in versioned files.
pub const VERSION_KEY: &str = "__version__";

const STORE_KEY: &str = "storeData";
const META_KEY: &str = "metaData";

/// Decoded contents of a collection file.
#[derive(Debug, Default)]
pub struct StoreImage {
    /// Documents keyed by [`crate::DocId::key`].
    pub documents: HashMap<String, Document>,
    /// Collection metadata (empty for legacy files).
    pub metadata: Metadata,
    /// Format version found in the file; `None` for the legacy layout.
    pub version: Option<u64>,
}

#[derive(Serialize)]
struct FileRecord<'a> {
    #[serde(rename = "__version__")]
    version: u64,
    #[serde(rename = "storeData")]
    store_data: BTreeMap<&'a str, &'a Document>,
    #[serde(rename = "metaData")]
    meta_data: &'a Metadata,
}

/// Encodes documents and metadata as a version 1 file.
///
/// Documents are written in key order so equal states give equal files.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(documents: &HashMap<String, Document>, metadata: &Metadata) -> CoreResult<Vec<u8>> {
    let record = FileRecord {
        version: FILE_VERSION,
        store_data: documents.iter().map(|(k, d)| (k.as_str(), d)).collect(),
        meta_data: metadata,
    };
    Ok(serde_json::to_vec_pretty(&record)?)
}

/// Decodes a collection file in either layout.
///
/// Entries of the document mapping that are not JSON objects are skipped
/// with a warning rather than failing the whole file.
///
/// # Errors
///
/// Returns an error if the bytes are not JSON, the top level is not an
/// object, or the version is missing, malformed or newer than
/// [`FILE_VERSION`].
pub fn decode(bytes: &[u8]) -> CoreResult<StoreImage> {
    let Value::Object(mut root) = serde_json::from_slice::<Value>(bytes)? else {
        return Err(CoreError::invalid_format("top level is not a JSON object"));
    };

    let Some(version) = root.remove(VERSION_KEY) else {
        return Ok(StoreImage {
            documents: decode_documents(root),
            metadata: Metadata::default(),
            version: None,
        });
    };

    let version = version
        .as_u64()
        .ok_or_else(|| CoreError::invalid_format(format!("bad {VERSION_KEY}: {version}")))?;
    if version > FILE_VERSION {
        return Err(CoreError::UnsupportedVersion {
            found: version,
            supported: FILE_VERSION,
        });
    }

    let documents = match root.remove(STORE_KEY) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(CoreError::invalid_format(format!("{STORE_KEY} is not an object"))),
    };
    let metadata = match root.remove(META_KEY) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(CoreError::invalid_format(format!("{META_KEY} is not an object"))),
    };

    Ok(StoreImage {
        documents: decode_documents(documents),
        metadata: Metadata::from_map(metadata),
        version: Some(version),
    })
}

fn decode_documents(raw: Map<String, Value>) -> HashMap<String, Document> {
    let mut documents = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        match value {
            Value::Object(fields) => {
                let doc = Document::from_stored(&key, fields);
                documents.insert(doc.id().key(), doc);
            }
            other => warn!("skipping entry {key:?}: expected an object, found {other}"),
        }
    }
    documents
}
