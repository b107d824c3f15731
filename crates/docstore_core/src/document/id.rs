//! Document identifier.

use crate::error::{CoreError, CoreResult};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Number of random bytes in a generated id.
pub const GENERATED_ID_BYTES: usize = 16;

/// Unique identifier for a document.
///
/// Ids are either strings or numbers, exactly as they appear in the
/// document's `id` field. Inside a collection they are addressed by their
/// canonical text form (see [`DocId::key`]), so the number `1` and the
/// string `"1"` refer to the same entry, as JSON object keys would.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocId {
    /// A string id. Generated ids are always of this kind.
    Text(String),
    /// A numeric id.
    Number(Number),
}

impl DocId {
    /// Creates a new random id: 128 bits from the OS random source, hex-encoded.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; GENERATED_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self::Text(hex::encode(bytes))
    }

    /// Returns the key this id is stored under.
    ///
    /// Integral floats key like the matching integer, so `1.0` and `1`
    /// address the same entry.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => number_key(n),
        }
    }

    /// Returns the id as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => Value::Number(n.clone()),
        }
    }

    /// Reads an id from the `id` field of an incoming document.
    ///
    /// `null` and the empty string mean "no id" and yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` for booleans, arrays and objects.
    pub fn from_value(value: &Value) -> CoreResult<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => Ok(Some(Self::Text(s.clone()))),
            Value::Number(n) => Ok(Some(Self::Number(n.clone()))),
            other => Err(CoreError::invalid_document(format!(
                "id must be a string or a number, got {other}"
            ))),
        }
    }
}

/// Largest magnitude below which every integer is exact in an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn number_key(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => {
            #[allow(clippy::cast_possible_truncation)]
            let int = f as i64;
            int.to_string()
        }
        _ => n.to_string(),
    }
}

impl fmt::Debug for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "DocId({s:?})"),
            Self::Number(n) => write!(f, "DocId({n})"),
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for DocId {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<i64> for DocId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for DocId {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for DocId {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&DocId> for DocId {
    fn from(id: &DocId) -> Self {
        id.clone()
    }
}

impl From<DocId> for Value {
    fn from(id: DocId) -> Self {
        id.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generate_is_unique() {
        let id1 = DocId::generate();
        let id2 = DocId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn generated_id_is_128_bit_hex() {
        let DocId::Text(s) = DocId::generate() else {
            panic!("generated id must be text");
        };
        assert_eq!(s.len(), GENERATED_ID_BYTES * 2);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn numeric_and_text_share_key() {
        assert_eq!(DocId::from(1).key(), DocId::from("1").key());
        assert_ne!(DocId::from(1), DocId::from("1"));
    }

    #[test]
    fn integral_floats_share_key_with_integers() {
        let float = DocId::from_value(&json!(1.0)).unwrap().unwrap();
        assert_eq!(float.key(), "1");
        assert_eq!(float.key(), DocId::from(1).key());

        let negative_zero = DocId::from_value(&json!(-0.0)).unwrap().unwrap();
        assert_eq!(negative_zero.key(), "0");

        let fraction = DocId::from_value(&json!(1.5)).unwrap().unwrap();
        assert_eq!(fraction.key(), "1.5");
    }

    #[test]
    fn from_value() {
        assert_eq!(DocId::from_value(&json!(null)).unwrap(), None);
        assert_eq!(DocId::from_value(&json!("")).unwrap(), None);
        assert_eq!(
            DocId::from_value(&json!("abc")).unwrap(),
            Some(DocId::from("abc"))
        );
        assert_eq!(DocId::from_value(&json!(78)).unwrap(), Some(DocId::from(78)));
        assert!(DocId::from_value(&json!(true)).is_err());
        assert!(DocId::from_value(&json!([1])).is_err());
    }

    #[test]
    fn value_roundtrip_keeps_kind() {
        assert_eq!(DocId::from(2).to_value(), json!(2));
        assert_eq!(DocId::from("2").to_value(), json!("2"));
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", DocId::from(42)), "42");
        assert_eq!(format!("{}", DocId::from("abc")), "abc");
    }
}
