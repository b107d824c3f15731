//! Document filters.
//!
//! `find` only needs a predicate over documents, expressed by the [`Filter`]
//! trait. Closures implement it directly. [`Query`] is the predicate compiled
//! from a MongoDB-style query document:
//!
//! ```rust,ignore
//! use serde_json::json;
//!
//! let urgent = store.find(&json!({ "prio": { "$gt": 3 } }))?;
//! let tagged = store.find_with(&|doc: &Document| doc.get("tags").is_some());
//! ```
//!
//! Supported: field equality, `$eq $ne $gt $gte $lt $lte $in $nin $exists`
//! per field, and `$and $or $nor $not` at the top level. Field names may be
//! dotted paths into nested objects and arrays.

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A predicate over documents.
pub trait Filter {
    /// Returns `true` if `doc` should be part of the result.
    fn matches(&self, doc: &Document) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&Document) -> bool,
{
    fn matches(&self, doc: &Document) -> bool {
        self(doc)
    }
}

/// A compiled query document.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    root: Node,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Nor(Vec<Node>),
    Not(Box<Node>),
    Field { path: String, conditions: Vec<Condition> },
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(Value),
    Ne(Value),
    Cmp(Ordering, bool, Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
}

impl Query {
    /// A query matching every document.
    #[must_use]
    pub fn all() -> Self {
        Self {
            root: Node::And(Vec::new()),
        }
    }

    /// Compiles a query document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilter` if the query is not an object, uses an
    /// unknown operator, or passes an operator an argument of the wrong type.
    pub fn parse(query: &Value) -> CoreResult<Self> {
        let Value::Object(map) = query else {
            return Err(CoreError::invalid_filter(format!(
                "query must be an object, got {query}"
            )));
        };
        Ok(Self {
            root: parse_object(map)?,
        })
    }
}

impl Filter for Query {
    fn matches(&self, doc: &Document) -> bool {
        self.root.eval(doc)
    }
}

fn parse_object(map: &Map<String, Value>) -> CoreResult<Node> {
    let mut nodes = Vec::with_capacity(map.len());

    for (key, value) in map {
        let node = match key.as_str() {
            "$and" => Node::And(parse_list(key, value)?),
            "$or" => Node::Or(parse_list(key, value)?),
            "$nor" => Node::Nor(parse_list(key, value)?),
            "$not" => match value {
                Value::Object(inner) => Node::Not(Box::new(parse_object(inner)?)),
                other => {
                    return Err(CoreError::invalid_filter(format!(
                        "$not expects a query object, got {other}"
                    )))
                }
            },
            op if op.starts_with('$') => {
                return Err(CoreError::invalid_filter(format!(
                    "unknown top-level operator {op}"
                )))
            }
            path => Node::Field {
                path: path.to_string(),
                conditions: parse_conditions(path, value)?,
            },
        };
        nodes.push(node);
    }

    if nodes.len() == 1 {
        return Ok(nodes.remove(0));
    }
    Ok(Node::And(nodes))
}

fn parse_list(op: &str, value: &Value) -> CoreResult<Vec<Node>> {
    let Value::Array(items) = value else {
        return Err(CoreError::invalid_filter(format!(
            "{op} expects an array of query objects"
        )));
    };

    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => parse_object(map),
            other => Err(CoreError::invalid_filter(format!(
                "{op} expects query objects, got {other}"
            ))),
        })
        .collect()
}

fn parse_conditions(path: &str, value: &Value) -> CoreResult<Vec<Condition>> {
    let operators = match value {
        Value::Object(map) if !map.is_empty() && map.keys().any(|k| k.starts_with('$')) => map,
        literal => return Ok(vec![Condition::Eq(literal.clone())]),
    };

    if operators.keys().any(|k| !k.starts_with('$')) {
        return Err(CoreError::invalid_filter(format!(
            "field {path} mixes operators and plain keys"
        )));
    }

    operators
        .iter()
        .map(|(op, arg)| {
            let condition = match op.as_str() {
                "$eq" => Condition::Eq(arg.clone()),
                "$ne" => Condition::Ne(arg.clone()),
                "$gt" => Condition::Cmp(Ordering::Greater, false, arg.clone()),
                "$gte" => Condition::Cmp(Ordering::Greater, true, arg.clone()),
                "$lt" => Condition::Cmp(Ordering::Less, false, arg.clone()),
                "$lte" => Condition::Cmp(Ordering::Less, true, arg.clone()),
                "$in" => Condition::In(array_arg(path, op, arg)?),
                "$nin" => Condition::Nin(array_arg(path, op, arg)?),
                "$exists" => match arg {
                    Value::Bool(b) => Condition::Exists(*b),
                    other => {
                        return Err(CoreError::invalid_filter(format!(
                            "$exists on {path} expects a boolean, got {other}"
                        )))
                    }
                },
                unknown => {
                    return Err(CoreError::invalid_filter(format!(
                        "unknown operator {unknown} on field {path}"
                    )))
                }
            };
            Ok(condition)
        })
        .collect()
}

fn array_arg(path: &str, op: &str, arg: &Value) -> CoreResult<Vec<Value>> {
    match arg {
        Value::Array(items) => Ok(items.clone()),
        other => Err(CoreError::invalid_filter(format!(
            "{op} on {path} expects an array, got {other}"
        ))),
    }
}

impl Node {
    fn eval(&self, doc: &Document) -> bool {
        match self {
            Self::And(nodes) => nodes.iter().all(|n| n.eval(doc)),
            Self::Or(nodes) => nodes.iter().any(|n| n.eval(doc)),
            Self::Nor(nodes) => !nodes.iter().any(|n| n.eval(doc)),
            Self::Not(node) => !node.eval(doc),
            Self::Field { path, conditions } => {
                let value = doc.get_path(path);
                conditions.iter().all(|c| c.eval(value))
            }
        }
    }
}

impl Condition {
    fn eval(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Eq(expected) => matches_eq(value, expected),
            Self::Ne(expected) => !matches_eq(value, expected),
            Self::Cmp(wanted, or_equal, bound) => value.is_some_and(|v| {
                any_element(v, |x| match compare(x, bound) {
                    Some(Ordering::Equal) => *or_equal,
                    Some(ord) => ord == *wanted,
                    None => false,
                })
            }),
            Self::In(options) => options.iter().any(|o| matches_eq(value, o)),
            Self::Nin(options) => !options.iter().any(|o| matches_eq(value, o)),
            Self::Exists(expected) => value.is_some() == *expected,
        }
    }
}

/// Equality with array membership: a field holding an array matches a
/// literal equal to the whole array or to any of its elements. A missing
/// field matches `null`.
fn matches_eq(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(v) => json_eq(v, expected) || any_element_only(v, |x| json_eq(x, expected)),
    }
}

fn any_element(value: &Value, pred: impl Fn(&Value) -> bool) -> bool {
    match value {
        Value::Array(items) => items.iter().any(pred),
        other => pred(other),
    }
}

fn any_element_only(value: &Value, pred: impl Fn(&Value) -> bool) -> bool {
    match value {
        Value::Array(items) => items.iter().any(pred),
        _ => false,
    }
}

/// Numbers compare by value regardless of integer/float representation.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering for `$gt`-style operators. Only numbers with numbers and strings
/// with strings are comparable.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
