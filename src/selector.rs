//! # Label selector semantics
//!
//! Implements the `@selector` operator's matching rules (spec §6): a
//! selector document with `matchLabels` (exact key/value match, all must
//! hold) and `matchExpressions` (`In`/`NotIn`/`Exists`/`DoesNotExist`
//! against a set of candidate values), evaluated against a label map.
//!
//! An empty selector matches nothing — the spec calls this "by design",
//! the caller is expected to pass a guard expression first if "match
//! everything" is the intended behavior.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Debug, Clone)]
pub struct MatchExpression {
    pub key: String,
    pub operator: MatchOperator,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Selector {
    pub match_labels: BTreeMap<String, String>,
    pub match_expressions: Vec<MatchExpression>,
}

impl Selector {
    /// An empty selector (no `matchLabels` and no `matchExpressions`)
    /// matches nothing.
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        if self.is_empty() {
            return false;
        }
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
            && self
                .match_expressions
                .iter()
                .all(|expr| expr.matches(labels))
    }
}

impl MatchExpression {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self.operator {
            MatchOperator::Exists => labels.contains_key(&self.key),
            MatchOperator::DoesNotExist => !labels.contains_key(&self.key),
            MatchOperator::In => labels
                .get(&self.key)
                .is_some_and(|v| self.values.iter().any(|candidate| candidate == v)),
            MatchOperator::NotIn => labels
                .get(&self.key)
                .is_none_or(|v| self.values.iter().all(|candidate| candidate != v)),
        }
    }
}
