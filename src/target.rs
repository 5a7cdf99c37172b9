//! # Target writer
//!
//! The sink a pipeline's output deltas are written to (spec §4.4). Two
//! write modes: `Updater` (replace the whole object) and `Patcher`
//! (merge only the projected fields). All operations must be idempotent
//! under retry — the controller worker does not deduplicate writes itself.

use crate::cache::Kind;
use crate::delta::{Delta, DeltaType};
use crate::value::Value;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole object on write; delete removes it entirely.
    Updater,
    /// Merge only the projected fields into the existing object, creating
    /// it first if absent.
    Patcher,
}

/// Identifies where a pipeline's output should land.
#[derive(Debug, Clone)]
pub struct Target {
    pub kind: Kind,
    pub mode: WriteMode,
}

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target write failed for {kind}/{namespace}/{name}: {message}")]
    WriteFailed {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },
}

/// Abstraction over the cluster client that actually performs writes.
/// `async-trait` rather than native `async fn in trait` to keep the trait
/// object-safe, so controllers can be built generically over any `Writer`.
#[async_trait]
pub trait Writer: Send + Sync {
    async fn write(&self, target: &Target, delta: &Delta) -> Result<(), TargetError>;
}

/// An in-memory `Writer` used by the `demos/` examples and integration
/// tests, standing in for a real cluster client the way the teacher's test
/// doubles stand in for a live backend.
#[derive(Debug, Default)]
pub struct InMemoryWriter {
    state: parking_lot::Mutex<BTreeMap<(String, String, String), Value>>,
}

impl InMemoryWriter {
    pub fn new() -> Self {
        InMemoryWriter::default()
    }

    pub fn get(&self, kind: &Kind, namespace: &str, name: &str) -> Option<Value> {
        self.state
            .lock()
            .get(&(kind.0.clone(), namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Writer for InMemoryWriter {
    async fn write(&self, target: &Target, delta: &Delta) -> Result<(), TargetError> {
        let (namespace, name) = delta.identity();
        let key = (target.kind.0.clone(), namespace.clone(), name.clone());
        let mut state = self.state.lock();

        match delta.delta_type {
            DeltaType::Deleted => {
                state.remove(&key);
            }
            _ => match target.mode {
                WriteMode::Updater => {
                    state.insert(key, delta.object.clone());
                }
                WriteMode::Patcher => {
                    let entry = state.entry(key).or_insert_with(|| Value::Map(Default::default()));
                    merge_patch(entry, &delta.object);
                }
            },
        }
        Ok(())
    }
}

/// JSON-merge-patch-style field merge: maps merge recursively, any other
/// value (including lists) replaces wholesale.
fn merge_patch(dest: &mut Value, patch: &Value) {
    match (dest, patch) {
        (Value::Map(dest_map), Value::Map(patch_map)) => {
            for (key, value) in patch_map {
                let entry = dest_map
                    .entry(key.clone())
                    .or_insert(Value::Null);
                merge_patch(entry, value);
            }
        }
        (dest, patch) => *dest = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target(mode: WriteMode) -> Target {
        Target {
            kind: Kind::new("ConfigMap"),
            mode,
        }
    }

    #[tokio::test]
    async fn updater_replaces_whole_object() {
        let writer = InMemoryWriter::new();
        let t = target(WriteMode::Updater);
        let first = Delta::added(Value::from(json!({"metadata": {"name": "c1"}, "data": {"a": 1}})));
        writer.write(&t, &first).await.unwrap();
        let second = Delta::updated(Value::from(json!({"metadata": {"name": "c1"}, "data": {"b": 2}})));
        writer.write(&t, &second).await.unwrap();
        let stored = writer.get(&Kind::new("ConfigMap"), "", "c1").unwrap();
        assert_eq!(stored, Value::from(json!({"metadata": {"name": "c1"}, "data": {"b": 2}})));
    }

    #[tokio::test]
    async fn patcher_merges_fields() {
        let writer = InMemoryWriter::new();
        let t = target(WriteMode::Patcher);
        let first = Delta::added(Value::from(json!({"metadata": {"name": "c1"}, "data": {"a": 1}})));
        writer.write(&t, &first).await.unwrap();
        let second = Delta::updated(Value::from(json!({"metadata": {"name": "c1"}, "data": {"b": 2}})));
        writer.write(&t, &second).await.unwrap();
        let stored = writer.get(&Kind::new("ConfigMap"), "", "c1").unwrap();
        assert_eq!(
            stored,
            Value::from(json!({"metadata": {"name": "c1"}, "data": {"a": 1, "b": 2}}))
        );
    }

    #[tokio::test]
    async fn delete_removes_object_under_either_mode() {
        let writer = InMemoryWriter::new();
        let t = target(WriteMode::Updater);
        let added = Delta::added(Value::from(json!({"metadata": {"name": "c1"}})));
        writer.write(&t, &added).await.unwrap();
        let deleted = Delta::deleted(Value::from(json!({"metadata": {"name": "c1"}})));
        writer.write(&t, &deleted).await.unwrap();
        assert!(writer.get(&Kind::new("ConfigMap"), "", "c1").is_none());
    }
}
