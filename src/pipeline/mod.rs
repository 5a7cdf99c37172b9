//! # Pipeline evaluator
//!
//! Turns one input [`Delta`] from a source kind into an ordered sequence of
//! output deltas, through an optional `@join` stage followed by zero or
//! more `@aggregate` sub-stages (spec §4.3). [`Engine`] is the stateful
//! half (view cache + emitted-view cache); [`Pipeline`] itself is pure
//! given engine state, mirroring the "Engine (A+B) is stateful, Pipeline
//! (C) is deterministic given engine state" split (spec §3).

mod stage;

pub use stage::AggStage;

use crate::cache::{Kind, ObjectKey, ViewCache};
use crate::delta::{Delta, DeltaType};
use crate::expr::{self, Context, Expr, ExpressionError};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error("{stage} result is missing metadata.name")]
    MissingIdentity { stage: &'static str },
    #[error("@unwind path {path} did not resolve to a list")]
    UnwindNotAList { path: String },
}

/// A pipeline's stage list: an optional join condition, followed by an
/// aggregate sequence. Construction-time invariants (sources non-empty,
/// `@join` required when `|sources| > 1`) are enforced by
/// [`crate::controller::ControllerConfig`], not here — `Pipeline` itself
/// is happy to run standalone in tests.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub sources: Vec<Kind>,
    pub join: Option<Expr>,
    pub aggregate: Vec<AggStage>,
}

/// Stateful engine half: the base view cache (one entry per source kind,
/// populated incrementally as deltas arrive) and the emitted-view cache
/// used to derive the delta-type policy (spec §4.3).
#[derive(Debug, Default)]
pub struct Engine {
    pub view_cache: ViewCache,
    /// Previously emitted output identities, keyed by the source object
    /// that produced them (`"{kind}/{namespace}/{name}"`), so that a
    /// re-evaluation can detect which previously-emitted compositions
    /// disappeared (→ synthesized `Deleted`) versus newly appeared
    /// (→ `Added`).
    emitted: BTreeMap<String, BTreeMap<ObjectKey, crate::value::Value>>,
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }

    /// Apply the incoming delta to the base view cache, returning the
    /// object a join stage should use for this source's slot: the new
    /// object for `Added`/`Updated`/`Replaced`/`Sync`, or the last-known
    /// cached object for `Deleted` (spec §4.2, §4.3).
    fn apply_base_delta(&mut self, kind: &Kind, delta: &Delta) -> crate::value::Value {
        let key = delta.identity();
        match delta.delta_type {
            DeltaType::Deleted => self
                .view_cache
                .delete(kind, &key)
                .unwrap_or_else(|| delta.object.clone()),
            _ => {
                self.view_cache.upsert(kind, key, delta.object.clone());
                delta.object.clone()
            }
        }
    }

    fn emit_key(source_kind: &Kind, identity: &ObjectKey) -> String {
        format!("{source_kind}/{}/{}", identity.0, identity.1)
    }
}

fn identity_of(object: &crate::value::Value) -> ObjectKey {
    (
        object.metadata_field("namespace").unwrap_or_default().to_string(),
        object.metadata_field("name").unwrap_or_default().to_string(),
    )
}

impl Pipeline {
    /// Evaluate the pipeline against one input delta from `source_kind`,
    /// producing the ordered output delta sequence (delete-before-add
    /// within this fan-out, per spec §5).
    pub fn evaluate(
        &self,
        engine: &mut Engine,
        source_kind: &Kind,
        delta: Delta,
    ) -> Result<Vec<Delta>, PipelineError> {
        let source_identity = delta.identity();
        let delta_type = delta.delta_type;
        let effective_object = engine.apply_base_delta(source_kind, &delta);

        if delta_type == DeltaType::Deleted {
            // `reconcile` re-emits exactly what was previously recorded for
            // this source object and never looks at `outputs` for a delete
            // (see below), so running join/aggregate here would be wasted
            // work — and could spuriously fail (e.g. a stale join
            // counterpart producing `MissingIdentity`) before a delete that
            // should always succeed ever reaches `reconcile`.
            return Ok(self.reconcile(engine, source_kind, &source_identity, delta_type, Vec::new()));
        }

        let mut stream = match &self.join {
            Some(condition) => {
                self.run_join(engine, source_kind, &effective_object, delta_type, condition)?
            }
            None => vec![(delta_type, effective_object)],
        };

        for stage in &self.aggregate {
            stream = stage.apply(stream)?;
        }

        Ok(self.reconcile(engine, source_kind, &source_identity, delta_type, stream))
    }

    /// `@join(condition)`: cartesian product of the other sources' current
    /// cache contents with `source_kind`'s slot fixed to `effective_object`,
    /// filtered by `condition`. Yields no outputs (not an error) if any
    /// counterpart source's cache is empty (spec §4.3).
    fn run_join(
        &self,
        engine: &Engine,
        source_kind: &Kind,
        effective_object: &crate::value::Value,
        delta_type: DeltaType,
        condition: &Expr,
    ) -> Result<Vec<(DeltaType, crate::value::Value)>, PipelineError> {
        let other_kinds: Vec<&Kind> = self.sources.iter().filter(|k| *k != source_kind).collect();

        let mut combos: Vec<BTreeMap<String, crate::value::Value>> = vec![BTreeMap::new()];
        for kind in &other_kinds {
            let objects = engine.view_cache.list(kind);
            if objects.is_empty() {
                return Ok(Vec::new());
            }
            let mut next = Vec::with_capacity(combos.len() * objects.len());
            for combo in &combos {
                for object in &objects {
                    let mut extended = combo.clone();
                    extended.insert(kind.0.clone(), (*object).clone());
                    next.push(extended);
                }
            }
            combos = next;
        }

        let mut outputs = Vec::new();
        for mut combo in combos {
            combo.insert(source_kind.0.clone(), effective_object.clone());
            let composite = expr::composite(&combo);
            let ctx = Context::root(&composite);
            if expr::eval(condition, &ctx)?.is_truthy() {
                outputs.push((delta_type, composite));
            }
        }
        Ok(outputs)
    }

    /// Apply the delta-type policy (spec §4.3): diff the new set of
    /// emitted identities against what this source object emitted last
    /// time, synthesizing `Deleted` for ones that disappeared and `Added`
    /// for ones that newly appeared, before re-storing the new set.
    fn reconcile(
        &self,
        engine: &mut Engine,
        source_kind: &Kind,
        source_identity: &ObjectKey,
        delta_type: DeltaType,
        outputs: Vec<(DeltaType, crate::value::Value)>,
    ) -> Vec<Delta> {
        let emit_key = Engine::emit_key(source_kind, source_identity);
        let previous = engine.emitted.remove(&emit_key).unwrap_or_default();

        if delta_type == DeltaType::Deleted {
            return previous
                .into_values()
                .map(Delta::deleted)
                .collect();
        }

        let mut current: BTreeMap<ObjectKey, (DeltaType, crate::value::Value)> = BTreeMap::new();
        for (ty, object) in outputs {
            current.insert(identity_of(&object), (ty, object));
        }

        let mut results = Vec::new();
        for (key, object) in &previous {
            if !current.contains_key(key) {
                results.push(Delta::deleted(object.clone()));
            }
        }
        for (key, (ty, object)) in &current {
            let out_type = if previous.contains_key(key) {
                *ty
            } else {
                DeltaType::Added
            };
            results.push(Delta::new(out_type, object.clone()));
        }

        engine.emitted.insert(
            emit_key,
            current.into_iter().map(|(k, (_, v))| (k, v)).collect(),
        );
        results
    }
}
