//! Operator table for the expression engine.
//!
//! Each arm below corresponds to one row of the operator catalogue in
//! spec §4.1. Grouped by shape rather than alphabetically: coercions,
//! comparisons, boolean combinators, list reductions, higher-order
//! combinators, then `@selector`.

use super::{Context, Expr, ExpressionError};
use crate::selector::{MatchExpression, MatchOperator, Selector};
use crate::value::{numeric_cmp, Value};
use std::collections::BTreeMap;

pub fn eval(expr: &Expr, ctx: &Context<'_>) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(i) => Ok(Value::Int(*i)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Str(s) => Expr::resolve_string_literal(s, ctx),
        Expr::List(items) => eval_list(items, ctx),
        Expr::Dict(pairs) => eval_dict(pairs, ctx),
        Expr::Op(op, args) => eval_op(op, args, ctx, expr),
    }
}

/// `@list` / a plain JSON array: evaluate each sub-expression, then apply
/// the one-level unpacking edge case (spec §4.1, open question §9.1): a
/// result of shape `[[...]]` (exactly one outer element, itself a list)
/// collapses to the inner list. This is load-bearing for `@map`, whose
/// result is typically wrapped in a surrounding `@list` to splice it into
/// a pipeline stream — and it destroys genuine 2-D lists, by design.
fn eval_list(items: &[Expr], ctx: &Context<'_>) -> Result<Value, ExpressionError> {
    let values: Vec<Value> = items
        .iter()
        .map(|item| eval(item, ctx))
        .collect::<Result<_, _>>()?;
    if let [Value::List(inner)] = values.as_slice() {
        return Ok(Value::List(inner.clone()));
    }
    Ok(Value::List(values))
}

/// `@dict` / a plain JSON object: evaluate each value, then write it at the
/// dotted path given by its key (the path-setter rule for `@dict` keys).
fn eval_dict(pairs: &[(String, Expr)], ctx: &Context<'_>) -> Result<Value, ExpressionError> {
    let mut doc = Value::Map(BTreeMap::new());
    for (key, value_expr) in pairs {
        let value = eval(value_expr, ctx)?;
        set_dotted(&mut doc, key, value);
    }
    Ok(doc)
}

fn set_dotted(root: &mut Value, dotted_key: &str, value: Value) {
    let fields: Vec<&str> = dotted_key.split('.').collect();
    set_fields(root, &fields, value);
}

fn set_fields(root: &mut Value, fields: &[&str], value: Value) {
    let Some((&first, rest)) = fields.split_first() else {
        *root = value;
        return;
    };
    if !matches!(root, Value::Map(_)) {
        *root = Value::Map(BTreeMap::new());
    }
    let map = root.as_map_mut().expect("just coerced to Map");
    if rest.is_empty() {
        map.insert(first.to_string(), value);
    } else {
        let entry = map
            .entry(first.to_string())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        set_fields(entry, rest, value);
    }
}

fn eval_op(
    op: &str,
    args: &[Expr],
    ctx: &Context<'_>,
    expr: &Expr,
) -> Result<Value, ExpressionError> {
    match op {
        "@bool" => Ok(Value::Bool(eval_one(args, ctx, op, expr)?.is_truthy())),
        "@int" => coerce_int(eval_one(args, ctx, op, expr)?, op, expr),
        "@float" => coerce_float(eval_one(args, ctx, op, expr)?, op, expr),
        "@string" => coerce_string(eval_one(args, ctx, op, expr)?),

        "@eq" => {
            let [a, b] = require_two(args, op, expr)?;
            Ok(Value::Bool(eval(a, ctx)? == eval(b, ctx)?))
        }
        "@lt" | "@lte" | "@gt" | "@gte" => eval_ordered_cmp(op, args, ctx, expr),

        "@not" => Ok(Value::Bool(!eval_one(args, ctx, op, expr)?.is_truthy())),
        "@and" => {
            let mut result = true;
            for arg in args {
                result &= eval(arg, ctx)?.is_truthy();
            }
            Ok(Value::Bool(result))
        }
        "@or" => {
            let mut result = false;
            for arg in args {
                result |= eval(arg, ctx)?.is_truthy();
            }
            Ok(Value::Bool(result))
        }

        "@isnil" => Ok(Value::Bool(eval_one(args, ctx, op, expr)?.is_null())),
        "@exists" => Ok(Value::Bool(!eval_one(args, ctx, op, expr)?.is_null())),

        "@abs" => eval_float_unary(args, ctx, op, expr, f64::abs, true),
        "@ceil" => eval_float_unary(args, ctx, op, expr, f64::ceil, false),
        "@floor" => eval_float_unary(args, ctx, op, expr, f64::floor, false),

        "@sum" => eval_sum(args, ctx, op, expr),
        "@len" => eval_len(args, ctx, op, expr),
        "@in" => eval_in(args, ctx, op, expr),
        "@concat" => eval_concat(args, ctx, op, expr),

        "@filter" => eval_filter(args, ctx, op, expr),
        "@map" => eval_map(args, ctx, op, expr),
        "@any" => eval_quantifier(args, ctx, op, expr, Quantifier::Any),
        "@all" => eval_quantifier(args, ctx, op, expr, Quantifier::All),
        "@none" => eval_quantifier(args, ctx, op, expr, Quantifier::None),

        "@selector" => eval_selector(args, ctx, op, expr),

        unknown => Err(ExpressionError::UnknownOp(unknown.to_string())),
    }
}

fn eval_one(
    args: &[Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
) -> Result<Value, ExpressionError> {
    match args {
        [single] => eval(single, ctx),
        other => Err(ExpressionError::Arity {
            op: op.to_string(),
            expected: "1",
            got: other.len(),
            expr: describe(expr),
        }),
    }
}

fn require_two<'e>(
    args: &'e [Expr],
    op: &str,
    expr: &Expr,
) -> Result<[&'e Expr; 2], ExpressionError> {
    match args {
        [a, b] => Ok([a, b]),
        other => Err(ExpressionError::Arity {
            op: op.to_string(),
            expected: "2",
            got: other.len(),
            expr: describe(expr),
        }),
    }
}

fn eval_ordered_cmp(
    op: &str,
    args: &[Expr],
    ctx: &Context<'_>,
    expr: &Expr,
) -> Result<Value, ExpressionError> {
    let [a, b] = require_two(args, op, expr)?;
    let (a, b) = (eval(a, ctx)?, eval(b, ctx)?);
    let ordering = numeric_cmp(&a, &b).ok_or_else(|| ExpressionError::TypeError {
        op: op.to_string(),
        expected: "numeric",
        got: format!("{a:?}, {b:?}"),
        expr: describe(expr),
    })?;
    use std::cmp::Ordering::*;
    let result = match (op, ordering) {
        ("@lt", Less) => true,
        ("@lte", Less | Equal) => true,
        ("@gt", Greater) => true,
        ("@gte", Greater | Equal) => true,
        _ => false,
    };
    Ok(Value::Bool(result))
}

fn coerce_int(v: Value, op: &str, expr: &Expr) -> Result<Value, ExpressionError> {
    match v {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Float(f) => Ok(Value::Int(f as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::String(ref s) => s
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ExpressionError::TypeError {
                op: op.to_string(),
                expected: "int-coercible",
                got: format!("{v:?}"),
                expr: describe(expr),
            }),
        other => Err(ExpressionError::TypeError {
            op: op.to_string(),
            expected: "int-coercible",
            got: format!("{other:?}"),
            expr: describe(expr),
        }),
    }
}

fn coerce_float(v: Value, op: &str, expr: &Expr) -> Result<Value, ExpressionError> {
    match v {
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Float(f) => Ok(Value::Float(f)),
        Value::Bool(b) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        Value::String(ref s) => s
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ExpressionError::TypeError {
                op: op.to_string(),
                expected: "float-coercible",
                got: format!("{v:?}"),
                expr: describe(expr),
            }),
        other => Err(ExpressionError::TypeError {
            op: op.to_string(),
            expected: "float-coercible",
            got: format!("{other:?}"),
            expr: describe(expr),
        }),
    }
}

fn coerce_string(v: Value) -> Result<Value, ExpressionError> {
    match v {
        Value::String(s) => Ok(Value::String(s)),
        other => Ok(Value::String(other.to_string())),
    }
}

fn eval_float_unary(
    args: &[Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
    f: impl Fn(f64) -> f64,
    preserve_int: bool,
) -> Result<Value, ExpressionError> {
    let value = eval_one(args, ctx, op, expr)?;
    match (&value, preserve_int) {
        (Value::Int(i), true) => Ok(Value::Int(i.abs())),
        _ => {
            let x = value.as_f64().ok_or_else(|| ExpressionError::TypeError {
                op: op.to_string(),
                expected: "numeric",
                got: format!("{value:?}"),
                expr: describe(expr),
            })?;
            Ok(Value::Float(f(x)))
        }
    }
}

fn eval_sum(
    args: &[Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
) -> Result<Value, ExpressionError> {
    let list = as_list(eval_one(args, ctx, op, expr)?, op, expr)?;
    if list.iter().all(|v| matches!(v, Value::Int(_))) {
        let total: i64 = list
            .iter()
            .map(|v| match v {
                Value::Int(i) => *i,
                _ => unreachable!(),
            })
            .sum();
        Ok(Value::Int(total))
    } else {
        let mut total = 0.0;
        for v in &list {
            total += v.as_f64().ok_or_else(|| ExpressionError::TypeError {
                op: op.to_string(),
                expected: "numeric list",
                got: format!("{v:?}"),
                expr: describe(expr),
            })?;
        }
        Ok(Value::Float(total))
    }
}

fn eval_len(
    args: &[Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
) -> Result<Value, ExpressionError> {
    let value = eval_one(args, ctx, op, expr)?;
    let len = match &value {
        Value::List(items) => items.len(),
        Value::String(s) => s.chars().count(),
        Value::Map(m) => m.len(),
        other => {
            return Err(ExpressionError::TypeError {
                op: op.to_string(),
                expected: "list, string or map",
                got: format!("{other:?}"),
                expr: describe(expr),
            })
        }
    };
    Ok(Value::Int(len as i64))
}

fn eval_in(
    args: &[Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
) -> Result<Value, ExpressionError> {
    let [elem, list] = require_two(args, op, expr)?;
    let elem = eval(elem, ctx)?;
    let list = as_list(eval(list, ctx)?, op, expr)?;
    Ok(Value::Bool(list.iter().any(|v| *v == elem)))
}

fn eval_concat(
    args: &[Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
) -> Result<Value, ExpressionError> {
    let list = as_list(eval_one(args, ctx, op, expr)?, op, expr)?;
    let mut out = String::new();
    for v in &list {
        match v {
            Value::String(s) => out.push_str(s),
            other => {
                return Err(ExpressionError::TypeError {
                    op: op.to_string(),
                    expected: "string list",
                    got: format!("{other:?}"),
                    expr: describe(expr),
                })
            }
        }
    }
    Ok(Value::String(out))
}

fn as_list(value: Value, op: &str, expr: &Expr) -> Result<Vec<Value>, ExpressionError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(ExpressionError::TypeError {
            op: op.to_string(),
            expected: "list",
            got: format!("{other:?}"),
            expr: describe(expr),
        }),
    }
}

/// `[lambda, list]` shape shared by `@filter`/`@map`/`@any`/`@all`/`@none`.
fn lambda_and_list<'e>(
    args: &'e [Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
) -> Result<(&'e Expr, Vec<Value>), ExpressionError> {
    let [lambda, list] = require_two(args, op, expr)?;
    let list = as_list(eval(list, ctx)?, op, expr)?;
    Ok((lambda, list))
}

/// A failing predicate aborts the whole combinator (fail-fast) rather than
/// skipping the offending element — the spec leaves this undefined (§9.2)
/// and this implementation picks fail-fast, consistent with "errors
/// propagate up evaluation; they are not recoverable within expression
/// evaluation" (§4.1).
fn eval_filter(
    args: &[Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
) -> Result<Value, ExpressionError> {
    let (lambda, list) = lambda_and_list(args, ctx, op, expr)?;
    let mut kept = Vec::new();
    for item in &list {
        let elem_ctx = ctx.with_subject(item);
        if eval(lambda, &elem_ctx)?.is_truthy() {
            kept.push(item.clone());
        }
    }
    Ok(Value::List(kept))
}

fn eval_map(
    args: &[Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
) -> Result<Value, ExpressionError> {
    let (lambda, list) = lambda_and_list(args, ctx, op, expr)?;
    let mut mapped = Vec::with_capacity(list.len());
    for item in &list {
        let elem_ctx = ctx.with_subject(item);
        mapped.push(eval(lambda, &elem_ctx)?);
    }
    Ok(Value::List(mapped))
}

enum Quantifier {
    Any,
    All,
    None,
}

fn eval_quantifier(
    args: &[Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
    quant: Quantifier,
) -> Result<Value, ExpressionError> {
    let (pred, list) = lambda_and_list(args, ctx, op, expr)?;
    let mut any_true = false;
    let mut all_true = true;
    for item in &list {
        let elem_ctx = ctx.with_subject(item);
        let truthy = eval(pred, &elem_ctx)?.is_truthy();
        any_true |= truthy;
        all_true &= truthy;
    }
    // Vacuous truth for an empty list: `@all`/`@none` hold, `@any` does not.
    Ok(Value::Bool(match quant {
        Quantifier::Any => any_true,
        Quantifier::All => all_true,
        Quantifier::None => !any_true,
    }))
}

fn eval_selector(
    args: &[Expr],
    ctx: &Context<'_>,
    op: &str,
    expr: &Expr,
) -> Result<Value, ExpressionError> {
    let [selector_expr, labels_expr] = require_two(args, op, expr)?;
    let selector_doc = eval(selector_expr, ctx)?;
    let labels_doc = eval(labels_expr, ctx)?;
    let selector = parse_selector(&selector_doc, op, expr)?;
    let labels = as_string_map(&labels_doc, op, expr)?;
    Ok(Value::Bool(selector.matches(&labels)))
}

fn parse_selector(doc: &Value, op: &str, expr: &Expr) -> Result<Selector, ExpressionError> {
    let map = doc.as_map().ok_or_else(|| ExpressionError::TypeError {
        op: op.to_string(),
        expected: "selector document",
        got: format!("{doc:?}"),
        expr: describe(expr),
    })?;

    let match_labels = match map.get("matchLabels") {
        Some(v) => as_string_map(v, op, expr)?,
        None => Default::default(),
    };

    let mut match_expressions = Vec::new();
    if let Some(Value::List(items)) = map.get("matchExpressions") {
        for item in items {
            let item_map = item.as_map().ok_or_else(|| ExpressionError::TypeError {
                op: op.to_string(),
                expected: "matchExpressions entry",
                got: format!("{item:?}"),
                expr: describe(expr),
            })?;
            let key = item_map
                .get("key")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let operator = match item_map.get("operator").and_then(Value::as_str) {
                Some("In") => MatchOperator::In,
                Some("NotIn") => MatchOperator::NotIn,
                Some("Exists") => MatchOperator::Exists,
                Some("DoesNotExist") => MatchOperator::DoesNotExist,
                other => {
                    return Err(ExpressionError::TypeError {
                        op: op.to_string(),
                        expected: "In, NotIn, Exists or DoesNotExist",
                        got: format!("{other:?}"),
                        expr: describe(expr),
                    })
                }
            };
            let values = match item_map.get("values") {
                Some(Value::List(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            };
            match_expressions.push(MatchExpression {
                key,
                operator,
                values,
            });
        }
    }

    Ok(Selector {
        match_labels,
        match_expressions,
    })
}

fn as_string_map(
    doc: &Value,
    op: &str,
    expr: &Expr,
) -> Result<BTreeMap<String, String>, ExpressionError> {
    let map = doc.as_map().ok_or_else(|| ExpressionError::TypeError {
        op: op.to_string(),
        expected: "string map",
        got: format!("{doc:?}"),
        expr: describe(expr),
    })?;
    let mut out = BTreeMap::new();
    for (k, v) in map {
        let s = v.as_str().ok_or_else(|| ExpressionError::TypeError {
            op: op.to_string(),
            expected: "string value",
            got: format!("{v:?}"),
            expr: describe(expr),
        })?;
        out.insert(k.clone(), s.to_string());
    }
    Ok(out)
}

fn describe(expr: &Expr) -> String {
    expr.to_json().to_string()
}
