//! Dotted key paths into JSON values.

use serde_json::{Map, Value};

/// Resolves a dotted path such as `"address.city"` or `"tags.0"`.
///
/// A top-level key equal to the whole path wins, so keys that contain a
/// dot stay reachable. Otherwise object segments are looked up by key and
/// array segments by decimal index. Returns `None` for an empty path or
/// when any segment is missing.
pub(crate) fn lookup<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    if let Some(value) = root.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}
