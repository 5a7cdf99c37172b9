//! # Expression engine
//!
//! The expression language is a set of JSON-embedded prefix operators
//! (spec §4.1). An [`Expr`] is the parsed form of that JSON; [`Context`] is
//! the `(object, subject)` pair an expression evaluates against: `$`-paths
//! dereference against `subject`, which starts out equal to `object` and is
//! rebound to the current element for the body of a `@map`/`@filter`/
//! `@any`/`@all`/`@none` lambda (tracing span is threaded through
//! separately as ambient context, not stored per spec's third tuple element
//! literally — see module docs on [`eval`]).
//!
//! Operators are dispatched through a fixed table (spec §9, "dynamic
//! dispatch on `@op`") implemented in [`ops`] rather than a giant `match`
//! spread across this module, mirroring the teacher's `BuiltinFunc`
//! catalogue-of-operators shape.

mod ops;

use crate::path::{Path, PathError};
use crate::value::Value;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use thiserror::Error;

pub use ops::eval;

/// A parsed expression tree.
///
/// Terminal literals (`Bool`/`Int`/`Float`/`Str`/`Null`) and the structural
/// `List`/`Dict` shapes are kept as distinct variants rather than folded
/// into `Op`, because both the JSON encoder (spec §6) and the evaluator
/// treat a bare literal differently from an explicit operator invocation.
/// Everything else — comparisons, boolean combinators, higher-order
/// combinators, `@selector` — is a uniform `Op(name, args)` node dispatched
/// through [`ops::eval`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A string literal. At evaluation time, a value starting with `$` is
    /// resolved as a JSON-path against the current context rather than
    /// taken literally (spec §4.1: "`@string` additionally resolves
    /// JSON-path if value begins with `$`" — applied to *any* string
    /// terminal, since `@string` is exactly what a bare string marshals
    /// to).
    Str(String),
    List(Vec<Expr>),
    /// Map literal with path-setter keys (spec: "paths inside `@dict` keys
    /// act as setters").
    Dict(Vec<(String, Expr)>),
    Op(String, Vec<Expr>),
}

#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("unknown operator: {0}")]
    UnknownOp(String),
    #[error("operator {op} expects {expected} argument(s), got {got}: {expr}")]
    Arity {
        op: String,
        expected: &'static str,
        got: usize,
        expr: String,
    },
    #[error("operator {op} requires a {expected} operand, got {got}: {expr}")]
    TypeError {
        op: String,
        expected: &'static str,
        got: String,
        expr: String,
    },
    #[error("invalid path in expression: {0}")]
    Path(#[from] PathError),
    #[error("{op} requires non-empty metadata.name in the projected document: {expr}")]
    MissingIdentity { op: String, expr: String },
}

/// Evaluation context (spec §4.1): `object` is the top-level document a
/// pipeline stage is evaluating; `subject` is what `$`-paths actually
/// dereference against — the element currently bound by a higher-order
/// combinator (`@map`/`@filter`/`@any`/`@all`/`@none`), or `object` itself
/// outside of one.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub object: &'a Value,
    pub subject: &'a Value,
}

impl<'a> Context<'a> {
    pub fn root(object: &'a Value) -> Self {
        Context {
            object,
            subject: object,
        }
    }

    /// A new context bound to `elem` for the body of a
    /// `@map`/`@filter`/`@any`/`@all`/`@none` lambda: `$`-paths inside the
    /// lambda dereference against `elem`, not the outer document.
    pub fn with_subject(&self, elem: &'a Value) -> Self {
        Context {
            object: self.object,
            subject: elem,
        }
    }
}

impl Expr {
    /// Parse an expression from its JSON encoding (spec §6).
    pub fn from_json(json: &Json) -> Result<Expr, ExpressionError> {
        match json {
            Json::Null => Ok(Expr::Null),
            Json::Bool(b) => Ok(Expr::Bool(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Expr::Int(i))
                } else {
                    Ok(Expr::Float(n.as_f64().unwrap_or(0.0)))
                }
            }
            Json::String(s) => Ok(Expr::Str(s.clone())),
            Json::Array(items) => Ok(Expr::List(
                items.iter().map(Expr::from_json).collect::<Result<_, _>>()?,
            )),
            Json::Object(map) => {
                if map.len() == 1 {
                    let (key, arg) = map.iter().next().expect("len checked above");
                    if let Some(op) = key.strip_prefix('@') {
                        return Self::parse_op(&format!("@{op}"), arg);
                    }
                }
                let mut pairs = Vec::with_capacity(map.len());
                for (key, value) in map {
                    pairs.push((key.clone(), Expr::from_json(value)?));
                }
                Ok(Expr::Dict(pairs))
            }
        }
    }

    fn parse_op(op: &str, arg: &Json) -> Result<Expr, ExpressionError> {
        match op {
            "@list" => {
                let Json::Array(items) = arg else {
                    return Err(ExpressionError::TypeError {
                        op: op.to_string(),
                        expected: "array",
                        got: describe(arg),
                        expr: arg.to_string(),
                    });
                };
                Ok(Expr::List(
                    items.iter().map(Expr::from_json).collect::<Result<_, _>>()?,
                ))
            }
            "@dict" => {
                let Json::Object(map) = arg else {
                    return Err(ExpressionError::TypeError {
                        op: op.to_string(),
                        expected: "object",
                        got: describe(arg),
                        expr: arg.to_string(),
                    });
                };
                let mut pairs = Vec::with_capacity(map.len());
                for (key, value) in map {
                    pairs.push((key.clone(), Expr::from_json(value)?));
                }
                Ok(Expr::Dict(pairs))
            }
            _ => match arg {
                Json::Array(items) => Ok(Expr::Op(
                    op.to_string(),
                    items.iter().map(Expr::from_json).collect::<Result<_, _>>()?,
                )),
                single => Ok(Expr::Op(op.to_string(), vec![Expr::from_json(single)?])),
            },
        }
    }

    /// Re-serialize to the JSON encoding. Round-trips semantically (P1):
    /// a plain JSON array/object and the explicit `@list`/`@dict` spelling
    /// of the same content both parse to the same [`Expr`], so this always
    /// emits the plain form.
    pub fn to_json(&self) -> Json {
        match self {
            Expr::Null => Json::Null,
            Expr::Bool(b) => Json::Bool(*b),
            Expr::Int(i) => Json::Number((*i).into()),
            Expr::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Expr::Str(s) => Json::String(s.clone()),
            Expr::List(items) => Json::Array(items.iter().map(Expr::to_json).collect()),
            Expr::Dict(pairs) => Json::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Expr::Op(op, args) => {
                let arg = match args.as_slice() {
                    [single] => single.to_json(),
                    many => Json::Array(many.iter().map(Expr::to_json).collect()),
                };
                Json::Object(std::iter::once((op.clone(), arg)).collect())
            }
        }
    }

    /// Resolve a string literal as a JSON-path if it begins with `$`,
    /// otherwise treat it as a literal string value.
    pub(crate) fn resolve_string_literal(s: &str, ctx: &Context<'_>) -> Result<Value, ExpressionError> {
        if s.starts_with('$') {
            let path = Path::parse(s)?;
            Ok(path.get(ctx.subject))
        } else {
            Ok(Value::String(s.to_string()))
        }
    }
}

fn describe(json: &Json) -> String {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
    .to_string()
}

/// Build a fresh join composite document keyed by kind name, used as the
/// `object` root when evaluating `@join` conditions and post-join
/// `@aggregate` stages (spec §4.3).
pub fn composite(objects: &BTreeMap<String, Value>) -> Value {
    Value::Map(objects.clone().into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_plain_literal() {
        let json = json!({"a": 1, "b": [1, 2, "$.x"]});
        let expr = Expr::from_json(&json).unwrap();
        let back = expr.to_json();
        let reparsed = Expr::from_json(&back).unwrap();
        assert_eq!(expr, reparsed);
    }

    #[test]
    fn round_trips_operator_invocation() {
        let json = json!({"@eq": [1, 2]});
        let expr = Expr::from_json(&json).unwrap();
        assert_eq!(expr, Expr::Op("@eq".into(), vec![Expr::Int(1), Expr::Int(2)]));
        assert_eq!(expr.to_json(), json);
    }

    #[test]
    fn explicit_and_implicit_list_parse_identically() {
        let explicit = Expr::from_json(&json!({"@list": [1, 2, 3]})).unwrap();
        let implicit = Expr::from_json(&json!([1, 2, 3])).unwrap();
        assert_eq!(explicit, implicit);
    }

    #[test]
    fn unknown_op_parses_but_is_recorded() {
        let expr = Expr::from_json(&json!({"@frobnicate": 1})).unwrap();
        assert_eq!(expr, Expr::Op("@frobnicate".into(), vec![Expr::Int(1)]));
    }
}
