//! Best-effort persistence for slot assignments, so a restarted gateway can
//! reuse prior slots. Never a source of truth: a node that fails to
//! re-register within a grace window is pruned regardless of what is saved
//! here.

use crate::error::StoreError;
use mash_types::{NodeId, SensorId, SlotIndex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedNode {
    pub node_id: NodeId,
    pub slot_index: SlotIndex,
    pub sensor_ids: Vec<SensorId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTopology {
    pub nodes: Vec<PersistedNode>,
}

pub trait TopologyStore: Send + Sync {
    fn load(&self) -> Option<PersistedTopology>;
    fn save(&self, topology: &PersistedTopology) -> Result<(), StoreError>;
}

/// Writes `topology.json` next to the gateway's config file. Load/save
/// failures are logged and degrade to empty/no-op, never propagated as
/// fatal errors.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TopologyStore for JsonFileStore {
    fn load(&self) -> Option<PersistedTopology> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(topo) => Some(topo),
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "failed to parse persisted topology, starting empty");
                    None
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to read persisted topology, starting empty");
                None
            }
        }
    }

    fn save(&self, topology: &PersistedTopology) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(topology)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// In-memory stand-in for tests and embedded targets without a filesystem.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Option<PersistedTopology>>,
}

impl TopologyStore for InMemoryStore {
    fn load(&self) -> Option<PersistedTopology> {
        self.inner.lock().unwrap().clone()
    }

    fn save(&self, topology: &PersistedTopology) -> Result<(), StoreError> {
        *self.inner.lock().unwrap() = Some(topology.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_roundtrips() {
        let store = InMemoryStore::default();
        assert!(store.load().is_none());
        let topo = PersistedTopology {
            nodes: vec![PersistedNode {
                node_id: NodeId::new(1).unwrap(),
                slot_index: SlotIndex::new(2).unwrap(),
                sensor_ids: vec![SensorId(10)],
            }],
        };
        store.save(&topo).unwrap();
        assert_eq!(store.load(), Some(topo));
    }

    #[test]
    fn json_file_store_missing_file_loads_none() {
        let store = JsonFileStore::new("/nonexistent/path/topology.json");
        assert!(store.load().is_none());
    }
}
