//! Per-document bookkeeping: timestamps and version.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Field name under which the store keeps [`DocumentMeta`].
pub const META_FIELD: &str = "meta";

/// Timestamps and version stamped on every document by `upsert`.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// When the document was first inserted. Never changes afterwards.
    pub created: u64,
    /// When the document was last upserted.
    pub updated: u64,
    /// Zero on insert, incremented by one on every upsert of the same id.
    pub version: u64,
}

impl DocumentMeta {
    /// Meta for a document inserted at `now`.
    #[must_use]
    pub const fn inserted(now: u64) -> Self {
        Self {
            created: now,
            updated: now,
            version: 0,
        }
    }

    /// Meta for an upsert at `now` over a document whose meta field was
    /// `previous`.
    ///
    /// Missing parts of a damaged previous meta fall back to insert values:
    /// `created` to `now` and the version to zero.
    #[must_use]
    pub fn next(previous: Option<&Value>, now: u64) -> Self {
        let created = previous
            .and_then(|m| m.get("created"))
            .and_then(Value::as_u64)
            .unwrap_or(now);
        let version = previous
            .and_then(|m| m.get("version"))
            .and_then(Value::as_u64)
            .map_or(0, |v| v.saturating_add(1));

        Self {
            created,
            updated: now,
            version,
        }
    }

    /// Parses the meta field of a document.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    /// Returns the meta as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "created": self.created,
            "updated": self.updated,
            "version": self.version,
        })
    }
}

/// Current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
