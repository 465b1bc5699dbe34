//! JSON graph snapshots
//!
//! A snapshot is the whole graph in one document, used to run the engine
//! against a file: load, run, save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use synaptic_core::{Edge, Entity};

use crate::{InMemoryGraphStore, StoreError};

/// Serialized graph contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,

    #[serde(default)]
    pub edges: Vec<Edge>,

    /// Start time of the last successful nightly run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_nightly_run: Option<DateTime<Utc>>,
}

impl GraphSnapshot {
    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl InMemoryGraphStore {
    /// Load a store from a snapshot file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let snapshot = GraphSnapshot::from_json(&text)?;

        info!(
            "Loaded graph from {}: {} entities, {} edges",
            path.display(),
            snapshot.entities.len(),
            snapshot.edges.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the store to a snapshot file, replacing it atomically
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let path = path.as_ref();
        let snapshot = self.snapshot();
        let json = snapshot.to_json()?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;

        info!(
            "Saved graph to {}: {} entities, {} edges",
            path.display(),
            snapshot.entities.len(),
            snapshot.edges.len()
        );
        Ok(())
    }
}
