//! # Deltas
//!
//! The unit of change the engine propagates through a pipeline (spec §3,
//! §4.3). A delta always carries the full object it describes — there is
//! no field-level diffing anywhere in this crate.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Kind of change a [`Delta`] describes.
///
/// `Sync` has no analogue in a single watch event; it is synthesized by the
/// controller loop at startup to seed the view cache from a full listing
/// (spec §3: "a source's initial state arrives as a batch of `Sync`
/// deltas, one per existing object").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaType {
    Added,
    Updated,
    Replaced,
    Deleted,
    Sync,
}

/// A single change to one object of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub delta_type: DeltaType,
    pub object: Value,
}

impl Delta {
    pub fn new(delta_type: DeltaType, object: Value) -> Self {
        Delta { delta_type, object }
    }

    pub fn added(object: Value) -> Self {
        Delta::new(DeltaType::Added, object)
    }

    pub fn updated(object: Value) -> Self {
        Delta::new(DeltaType::Updated, object)
    }

    pub fn deleted(object: Value) -> Self {
        Delta::new(DeltaType::Deleted, object)
    }

    pub fn sync(object: Value) -> Self {
        Delta::new(DeltaType::Sync, object)
    }

    /// `(namespace, name)` identity of the carried object (spec §3: objects
    /// are identified by namespace + name within a kind). Cluster-scoped
    /// objects use an empty namespace.
    pub fn identity(&self) -> (String, String) {
        let namespace = self
            .object
            .metadata_field("namespace")
            .unwrap_or_default()
            .to_string();
        let name = self
            .object
            .metadata_field("name")
            .unwrap_or_default()
            .to_string();
        (namespace, name)
    }

    pub fn is_removal(&self) -> bool {
        matches!(self.delta_type, DeltaType::Deleted)
    }
}
