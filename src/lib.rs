//! # Controller Runtime
//!
//! A declarative controller runtime: an incremental view-maintenance
//! engine for a cluster-orchestration platform. Each controller subscribes
//! to one or more source kinds, runs every incoming change through a
//! pipeline of `@join`/`@aggregate` stages, and writes the resulting
//! deltas to a target.
//!
//! ## Data flow
//!
//! ```text
//! watch-event
//!     ↓
//! [Request]                      (controller.rs)
//!     ↓
//! base-object fetch / tombstone   → Delta           (delta.rs)
//!     ↓
//! [Pipeline::evaluate(Engine)]                       (pipeline/)
//!     ├── @join     — composite across source caches  (cache.rs)
//!     └── @aggregate — @select / @project / @unwind   (expr/)
//!     ↓
//! [Delta] (delete-before-add within one fan-out)
//!     ↓
//! Target::write                                       (target.rs)
//! ```
//!
//! The expression engine (`expr/`), document value model (`value.rs`) and
//! JSON-path resolver (`path.rs`) are the common substrate every stage
//! evaluates against. The view cache (`cache.rs`) and emitted-view cache
//! (folded into `pipeline::Engine`) are the only mutable state; everything
//! else is a pure function of that state plus the incoming delta.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use controller_runtime::cache::{Kind, ViewCache};
//! use controller_runtime::controller::{spawn, ControllerConfig, Request, WatchEvent};
//! use controller_runtime::pipeline::Pipeline;
//! use controller_runtime::target::{InMemoryWriter, Target, WriteMode};
//! use std::sync::Arc;
//!
//! let config = ControllerConfig {
//!     sources: vec![Kind::new("Pod")],
//!     pipeline: Pipeline::default(),
//!     target: Target { kind: Kind::new("Pod"), mode: WriteMode::Updater },
//! };
//! let writer = Arc::new(InMemoryWriter::new());
//! let object_cache = Arc::new(parking_lot::RwLock::new(ViewCache::new()));
//! let (handle, _status) = spawn(config, writer, object_cache, 1024);
//! ```

pub mod cache;
pub mod config;
pub mod controller;
pub mod delta;
pub mod error;
pub mod expr;
pub mod path;
pub mod pipeline;
pub mod reporter;
pub mod selector;
pub mod target;
pub mod value;

pub use cache::{CacheError, Kind, ObjectCache, ObjectKey, ViewCache};
pub use config::RuntimeConfig;
pub use controller::{ControllerConfig, ControllerError, ControllerHandle, Request, WatchEvent};
pub use delta::{Delta, DeltaType};
pub use error::CoreError;
pub use expr::{Context, Expr, ExpressionError};
pub use path::{Path, PathError};
pub use pipeline::{AggStage, Engine, Pipeline, PipelineError};
pub use reporter::{Reporter, ReporterState};
pub use selector::{MatchExpression, MatchOperator, Selector};
pub use target::{InMemoryWriter, Target, TargetError, WriteMode, Writer};
pub use value::Value;
