//! # Document Value Type
//!
//! Every object flowing through the engine — source objects, view
//! compositions, projection templates — is an unstructured document: a
//! recursively nested mapping of string keys to values of type
//! `{null | bool | int64 | float64 | string | list | map}`.
//!
//! `Value` is the tagged union that represents one such document (or any
//! node within it). It round-trips through `serde_json::Value` exactly,
//! which is what the expression wire format (`Expr`, see [`crate::expr`])
//! and the cluster object store both speak.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A schema-less document value.
///
/// Maps use `BTreeMap` rather than `HashMap` so that two structurally equal
/// documents compare equal regardless of insertion order, and so that
/// projected output is deterministic for tests and logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Truthiness used by `@select`, `@and`/`@or`, `@filter` predicates.
    ///
    /// `Null`, `false`, zero, empty string, empty list and empty map are
    /// falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric coercion rule (spec §4.1): if both operands are `Int`,
    /// arithmetic stays int-preserving; otherwise both are widened to f64.
    pub fn coerce_numeric_pair(a: &Value, b: &Value) -> Option<NumericPair> {
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => Some(NumericPair::Int(*x, *y)),
            (Value::Int(x), Value::Float(y)) => Some(NumericPair::Float(*x as f64, *y)),
            (Value::Float(x), Value::Int(y)) => Some(NumericPair::Float(*x, *y as f64)),
            (Value::Float(x), Value::Float(y)) => Some(NumericPair::Float(*x, *y)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// `metadata.name` / `metadata.namespace` accessors used throughout the
    /// pipeline for identity extraction (spec §3).
    pub fn metadata_field(&self, field: &str) -> Option<&str> {
        self.as_map()?
            .get("metadata")?
            .as_map()?
            .get(field)?
            .as_str()
    }
}

/// Result of [`Value::coerce_numeric_pair`]: either both operands stayed
/// `Int`, or at least one was a `Float` and both were widened.
pub enum NumericPair {
    Int(i64, i64),
    Float(f64, f64),
}

/// Ordering used by `@lt`/`@lte`/`@gt`/`@gte`. Only defined for numeric
/// pairs; callers must check `Value::is_numeric` first (spec: "ordered ops
/// require both args numeric").
pub fn numeric_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match Value::coerce_numeric_pair(a, b)? {
        NumericPair::Int(x, y) => Some(x.cmp(&y)),
        NumericPair::Float(x, y) => x.partial_cmp(&y),
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json: serde_json::Value = self.clone().into();
        write!(f, "{json}")
    }
}
