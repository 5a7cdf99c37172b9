//! # JSON-path resolution
//!
//! Implements the two path syntaxes from spec §4.1: dotted (`$.a.b.c`) and
//! bracketed (`$["a"]["b"]`), plus the kind-qualified form
//! (`$ConfigMap.metadata.name`) used to reach into a multi-source join
//! context (spec §4.3).
//!
//! A join composite is represented as a single [`Value::Map`] keyed by kind
//! name (`{"ConfigMap": {...}, "Deployment": {...}}`), so `$ConfigMap.path`
//! and the equivalent `$.ConfigMap.path` resolve identically — the bare
//! leading identifier is sugar, not a distinct addressing mode. [`Path::get`]
//! and [`Path::set`] therefore walk *all* segments as plain field steps;
//! [`Path::kind_qualifier`] is exposed separately only so callers that build
//! join composites can tell whether a path was written in the bare form.
//!
//! Resolution never fails on a missing key — it yields [`Value::Null`], per
//! spec: "a path that dereferences a missing key yields null; the op
//! consuming it decides whether null is fatal."

use crate::value::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// First element carries whether it was written as a bare identifier
    /// (`$Kind...`) rather than after a leading dot (`$.kind...`).
    segments: Vec<String>,
    bare_leading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path must start with '$': {0}")]
    MissingDollar(String),
    #[error("unterminated bracket segment in path: {0}")]
    UnterminatedBracket(String),
    #[error("empty field name in path: {0}")]
    EmptyField(String),
}

impl Path {
    /// Parse a JSON-path string. `raw` must start with `$`.
    pub fn parse(raw: &str) -> Result<Path, PathError> {
        let rest = raw
            .strip_prefix('$')
            .ok_or_else(|| PathError::MissingDollar(raw.to_string()))?;

        let mut segments = Vec::new();
        let mut chars = rest.chars().peekable();

        let mut leading = String::new();
        while let Some(&c) = chars.peek() {
            if c == '.' || c == '[' {
                break;
            }
            leading.push(c);
            chars.next();
        }
        let bare_leading = !leading.is_empty();
        if bare_leading {
            segments.push(leading);
        }

        let mut buf = String::new();
        let mut in_bracket = false;
        while let Some(c) = chars.next() {
            match c {
                '.' if !in_bracket => {
                    if !buf.is_empty() {
                        segments.push(std::mem::take(&mut buf));
                    }
                }
                '[' => {
                    if !buf.is_empty() {
                        segments.push(std::mem::take(&mut buf));
                    }
                    in_bracket = true;
                }
                ']' => {
                    if !in_bracket {
                        return Err(PathError::UnterminatedBracket(raw.to_string()));
                    }
                    let key = buf.trim_matches(|c| c == '"' || c == '\'').to_string();
                    if key.is_empty() {
                        return Err(PathError::EmptyField(raw.to_string()));
                    }
                    segments.push(key);
                    buf.clear();
                    in_bracket = false;
                }
                other => buf.push(other),
            }
        }
        if in_bracket {
            return Err(PathError::UnterminatedBracket(raw.to_string()));
        }
        if !buf.is_empty() {
            segments.push(buf);
        }

        Ok(Path {
            segments,
            bare_leading,
        })
    }

    /// The leading kind name, if this path was written as `$Kind.path…`
    /// rather than `$.path…`.
    pub fn kind_qualifier(&self) -> Option<&str> {
        if self.bare_leading {
            self.segments.first().map(String::as_str)
        } else {
            None
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// Resolve this path against `root`, yielding `Value::Null` for any
    /// missing intermediate key.
    pub fn get(&self, root: &Value) -> Value {
        let mut current = root;
        for field in self.segments() {
            match current.as_map().and_then(|m| m.get(field)) {
                Some(v) => current = v,
                None => return Value::Null,
            }
        }
        current.clone()
    }

    /// Write `value` at this path within `root`, creating intermediate maps
    /// as needed. Used by `@dict` key setters (spec §4.1).
    pub fn set(&self, root: &mut Value, value: Value) {
        let fields: Vec<&str> = self.segments().collect();
        set_fields(root, &fields, value);
    }
}

fn set_fields(root: &mut Value, fields: &[&str], value: Value) {
    let Some((&first, rest)) = fields.split_first() else {
        *root = value;
        return;
    };
    if !matches!(root, Value::Map(_)) {
        *root = Value::Map(Default::default());
    }
    let map = root.as_map_mut().expect("just coerced to Map");
    if rest.is_empty() {
        map.insert(first.to_string(), value);
    } else {
        let entry = map
            .entry(first.to_string())
            .or_insert_with(|| Value::Map(Default::default()));
        set_fields(entry, rest, value);
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for (i, seg) in self.segments.iter().enumerate() {
            if i == 0 && self.bare_leading {
                write!(f, "{seg}")?;
            } else {
                write!(f, ".{seg}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_dotted_path() {
        let path = Path::parse("$.a.b.c").unwrap();
        assert_eq!(path.kind_qualifier(), None);
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn parses_bracketed_path() {
        let path = Path::parse(r#"$["a"]["b"]"#).unwrap();
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn kind_qualified_and_dotted_forms_resolve_identically() {
        let bare = Path::parse("$ConfigMap.metadata.name").unwrap();
        let dotted = Path::parse("$.ConfigMap.metadata.name").unwrap();
        assert_eq!(bare.kind_qualifier(), Some("ConfigMap"));
        assert_eq!(dotted.kind_qualifier(), None);

        let composite: Value = json!({"ConfigMap": {"metadata": {"name": "c1"}}}).into();
        assert_eq!(bare.get(&composite), dotted.get(&composite));
        assert_eq!(bare.get(&composite), Value::String("c1".to_string()));
    }

    #[test]
    fn missing_key_yields_null() {
        let root: Value = json!({"a": 1}).into();
        let path = Path::parse("$.a.b.c").unwrap();
        assert_eq!(path.get(&root), Value::Null);
    }

    #[test]
    fn get_resolves_nested_field() {
        let root: Value = json!({"metadata": {"name": "p"}}).into();
        let path = Path::parse("$.metadata.name").unwrap();
        assert_eq!(path.get(&root), Value::String("p".to_string()));
    }

    #[test]
    fn set_creates_intermediate_maps() {
        let mut root = Value::Map(Default::default());
        let path = Path::parse("$.a.b.c").unwrap();
        path.set(&mut root, Value::Int(42));
        let got = Path::parse("$.a.b.c").unwrap().get(&root);
        assert_eq!(got, Value::Int(42));
    }

    #[test]
    fn rejects_path_without_dollar() {
        assert!(Path::parse("a.b.c").is_err());
    }
}
