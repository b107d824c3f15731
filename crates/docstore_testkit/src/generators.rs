//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random JSON documents and the
//! operations applied to a store.

use proptest::prelude::*;
use serde_json::{Map, Number, Value};

/// Strategy for generating field names. Never produces `id` or `meta`,
/// which the store manages.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9_]{0,11}")
        .expect("Invalid regex")
        .prop_filter("Reserved field name", |s| s != "id" && s != "meta")
}

/// Strategy for generating JSON scalars that survive a text round-trip.
///
/// Floats are quarters, which print and parse exactly.
pub fn json_scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1_000_000i32..1_000_000).prop_filter_map("Non-finite float", |n| {
            Number::from_f64(f64::from(n) / 4.0).map(Value::Number)
        }),
        ".{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for generating arbitrary JSON values, nested up to three levels.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    json_scalar_strategy().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 0..6)
                .prop_map(|fields| Value::Object(fields.into_iter().collect())),
        ]
    })
}

/// Strategy for generating document ids: short strings or small integers.
pub fn doc_id_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z0-9]{1,8}".prop_map(Value::String),
        (0..1000i64).prop_map(Value::from),
    ]
}

/// Strategy for generating document bodies without an id.
pub fn document_body_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(field_name_strategy(), json_value_strategy(), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Strategy for generating documents with an id.
pub fn document_strategy() -> impl Strategy<Value = Value> {
    (doc_id_strategy(), document_body_strategy()).prop_map(|(id, mut fields)| {
        fields.insert("id".to_string(), id);
        Value::Object(fields)
    })
}

/// Strategy for generating collection names, including ones with spaces
/// and mixed case that need slugging.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9 _-]{0,23}")
        .expect("Invalid regex")
        .prop_filter("Collection name must not be empty", |s| !s.trim().is_empty())
}

/// An operation applied to a store.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Upsert a document.
    Upsert {
        /// The document, with its id.
        document: Value,
    },
    /// Delete by id.
    Delete {
        /// The id to delete.
        id: Value,
    },
    /// Merge into the collection metadata.
    MetaSet {
        /// The metadata patch.
        patch: Map<String, Value>,
    },
    /// Remove every document.
    Clear,
}

/// Strategy for generating store operations.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    prop_oneof![
        6 => document_strategy().prop_map(|document| StoreOperation::Upsert { document }),
        2 => doc_id_strategy().prop_map(|id| StoreOperation::Delete { id }),
        1 => document_body_strategy().prop_map(|patch| StoreOperation::MetaSet { patch }),
        1 => Just(StoreOperation::Clear),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
