use mash_types::{NodeId, SensorId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("no free slots in the superframe")]
    NoFreeSlots,
    #[error("sensor {sensor_id} already claimed by node {owner}")]
    SensorConflict { sensor_id: SensorId, owner: NodeId },
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("topology store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("topology store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
