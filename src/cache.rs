//! # View cache
//!
//! Holds the current materialized state of every kind the engine tracks —
//! both raw source kinds and the views produced by pipeline stages (spec
//! §3: "the engine maintains one cache per kind, keyed by namespace and
//! name"). A single writer (the controller worker task) owns mutation;
//! [`ViewCache`] is plain, not internally synchronized — callers that need
//! concurrent read access wrap it in `parking_lot::RwLock` themselves
//! (spec §5: "reads, if exposed, go through a reader-writer lock; there is
//! exactly one writer").

use crate::value::Value;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// A kind name (`"ConfigMap"`, `"Deployment"`, or a pipeline-internal view
/// name). Newtype rather than a bare `String` so cache keys can't be
/// accidentally confused with object names at call sites.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Kind(pub String);

impl Kind {
    pub fn new(name: impl Into<String>) -> Self {
        Kind(name.into())
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Kind {
    fn from(s: &str) -> Self {
        Kind(s.to_string())
    }
}

/// `(namespace, name)` identity of an object within a kind. Cluster-scoped
/// objects use an empty namespace string.
pub type ObjectKey = (String, String);

/// Per-kind materialized state: `ObjectKey -> Value`.
#[derive(Debug, Default, Clone)]
pub struct ViewCache {
    kinds: BTreeMap<Kind, BTreeMap<ObjectKey, Value>>,
}

impl ViewCache {
    pub fn new() -> Self {
        ViewCache::default()
    }

    /// Insert or overwrite an object. Returns the previous value, if any.
    pub fn upsert(&mut self, kind: &Kind, key: ObjectKey, object: Value) -> Option<Value> {
        self.kinds
            .entry(kind.clone())
            .or_default()
            .insert(key, object)
    }

    /// Remove an object. Returns the removed value, if it was present.
    pub fn delete(&mut self, kind: &Kind, key: &ObjectKey) -> Option<Value> {
        self.kinds.get_mut(kind)?.remove(key)
    }

    pub fn get(&self, kind: &Kind, key: &ObjectKey) -> Option<&Value> {
        self.kinds.get(kind)?.get(key)
    }

    /// All objects of a kind, in key order — deterministic for joins and
    /// for tests.
    pub fn list(&self, kind: &Kind) -> Vec<&Value> {
        self.kinds
            .get(kind)
            .map(|objects| objects.values().collect())
            .unwrap_or_default()
    }

    pub fn list_keys(&self, kind: &Kind) -> Vec<&ObjectKey> {
        self.kinds
            .get(kind)
            .map(|objects| objects.keys().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, kind: &Kind, key: &ObjectKey) -> bool {
        self.kinds
            .get(kind)
            .is_some_and(|objects| objects.contains_key(key))
    }

    pub fn len(&self, kind: &Kind) -> usize {
        self.kinds.get(kind).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, kind: &Kind) -> bool {
        self.len(kind) == 0
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("object cache backend failed for kind {kind}: {message}")]
    BackendFailure { kind: String, message: String },
}

/// Cluster collaborator consumed by the controller loop (spec §6): the
/// current, authoritative state of a kind. Distinct from `ViewCache` (the
/// engine's own incrementally-maintained base view) even though an
/// in-process implementation may well be backed by one — the controller
/// fetches through this before building a delta (spec §4.5 step 1). A
/// missing key is `Ok(None)`, not an error; `CacheError` is reserved for a
/// genuine backend failure (RPC timeout, connection loss).
#[async_trait]
pub trait ObjectCache: Send + Sync {
    async fn get(&self, kind: &Kind, key: &ObjectKey) -> Result<Option<Value>, CacheError>;
    async fn list(&self, kind: &Kind) -> Result<Vec<Value>, CacheError>;
}

/// A `ViewCache` behind a reader-writer lock doubles as an `ObjectCache` —
/// the "single writer, `parking_lot::RwLock` reader" shape spec §5 calls
/// for, reused here instead of standing up a second store for demos and
/// integration tests.
#[async_trait]
impl ObjectCache for parking_lot::RwLock<ViewCache> {
    async fn get(&self, kind: &Kind, key: &ObjectKey) -> Result<Option<Value>, CacheError> {
        Ok(self.read().get(kind, key).cloned())
    }

    async fn list(&self, kind: &Kind) -> Result<Vec<Value>, CacheError> {
        Ok(self.read().list(kind).into_iter().cloned().collect())
    }
}
