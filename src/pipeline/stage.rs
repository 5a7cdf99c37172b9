//! `@aggregate` sub-stages: `@select`, `@project`, `@unwind` (spec §4.3).

use super::PipelineError;
use crate::delta::DeltaType;
use crate::expr::{self, Context, Expr};
use crate::path::Path;
use crate::value::Value;

/// One step of an `@aggregate` stage sequence.
#[derive(Debug, Clone)]
pub enum AggStage {
    /// Keep compositions for which `expr` evaluates truthy.
    Select(Expr),
    /// Evaluate a document template against each composition; the result
    /// replaces it. `metadata.name`/`metadata.namespace` must be present in
    /// the result — they become the projected object's identity.
    Project(Expr),
    /// Fan out one composition per element at `path` (which must resolve
    /// to a list), substituting that element in place.
    Unwind(Path),
}

/// A composition flowing through the aggregate sequence, paired with the
/// delta type it currently carries.
pub type Composition = (DeltaType, Value);

impl AggStage {
    pub fn apply(&self, stream: Vec<Composition>) -> Result<Vec<Composition>, PipelineError> {
        match self {
            AggStage::Select(expr) => apply_select(expr, stream),
            AggStage::Project(template) => apply_project(template, stream),
            AggStage::Unwind(path) => apply_unwind(path, stream),
        }
    }
}

fn apply_select(
    predicate: &Expr,
    stream: Vec<Composition>,
) -> Result<Vec<Composition>, PipelineError> {
    let mut kept = Vec::with_capacity(stream.len());
    for (ty, composite) in stream {
        let ctx = Context::root(&composite);
        if expr::eval(predicate, &ctx)?.is_truthy() {
            kept.push((ty, composite));
        }
    }
    Ok(kept)
}

fn apply_project(
    template: &Expr,
    stream: Vec<Composition>,
) -> Result<Vec<Composition>, PipelineError> {
    let mut projected = Vec::with_capacity(stream.len());
    for (ty, composite) in stream {
        let ctx = Context::root(&composite);
        let document = expr::eval(template, &ctx)?;
        if document.metadata_field("name").unwrap_or_default().is_empty() {
            return Err(PipelineError::MissingIdentity { stage: "@project" });
        }
        projected.push((ty, document));
    }
    Ok(projected)
}

fn apply_unwind(path: &Path, stream: Vec<Composition>) -> Result<Vec<Composition>, PipelineError> {
    let mut unwound = Vec::with_capacity(stream.len());
    for (ty, composite) in stream {
        let elements = path.get(&composite);
        let Value::List(items) = elements else {
            return Err(PipelineError::UnwindNotAList {
                path: path.to_string(),
            });
        };
        for item in items {
            let mut branch = composite.clone();
            path.set(&mut branch, item);
            unwound.push((ty, branch));
        }
    }
    Ok(unwound)
}
