//! # Crate-level error aggregation
//!
//! Each module owns its own `thiserror`-derived error enum
//! (`ExpressionError`, `PipelineError`, `TargetError`, `ControllerError`,
//! `CacheError`, `ConfigError`). [`CoreError`] aggregates them with
//! `#[from]` conversions for call sites that cross module boundaries and
//! need a single error type — mirroring the storage/protocol error split
//! this runtime grew from. Matches the five error kinds of spec §7: config,
//! expression, cache, target and critical errors (the fifth, "critical",
//! is a `Reporter` flag rather than a distinct error type — see
//! `src/reporter.rs`).

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::controller::ControllerError;
use crate::expr::ExpressionError;
use crate::pipeline::PipelineError;
use crate::target::TargetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
