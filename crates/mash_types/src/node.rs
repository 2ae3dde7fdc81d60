//! Node lifecycle types.

use crate::ids::{NodeId, SensorId, SlotIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle state of a node as tracked by the topology manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Heard from (via REGISTER_REQ) but not yet assigned a slot.
    Pending,
    /// Has a slot and is expected to transmit DATA every superframe.
    Active,
    /// Missed enough beacons/heartbeats to be considered unreachable.
    Silent,
}

/// A read-only snapshot of a node's sync state, as maintained by the PTP
/// engine (`mash_sync`) and surfaced to the command/status surface and the
/// topology manager without either owning the PTP engine's internals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub smoothed_offset_us: i64,
    pub last_raw_offset_us: i64,
    pub last_path_delay_us: i64,
    pub bootstrap_remaining: u8,
    pub consecutive_rejects: u32,
    pub sync_fault: bool,
}

/// A node known to the gateway's topology manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredNode {
    pub node_id: NodeId,
    pub slot_index: Option<SlotIndex>,
    pub sensor_ids: BTreeSet<SensorId>,
    pub last_heard_us: u64,
    pub state: NodeState,
    pub sync: SyncSnapshot,
}

impl RegisteredNode {
    pub fn new_pending(node_id: NodeId, sensor_ids: BTreeSet<SensorId>, now_us: u64) -> Self {
        Self {
            node_id,
            slot_index: None,
            sensor_ids,
            last_heard_us: now_us,
            state: NodeState::Pending,
            sync: SyncSnapshot::default(),
        }
    }
}
