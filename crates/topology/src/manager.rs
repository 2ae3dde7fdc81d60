//! Owns the gateway's view of which nodes exist, which slot each holds, and
//! who is still waiting on a slot.

use crate::error::TopologyError;
use crate::persistence::PersistedTopology;
use mash_types::{NodeId, NodeState, RegisteredNode, SensorId, SlotIndex, MAX_SLOTS};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::{info, warn};

/// Why a registration attempt was refused a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    DuplicateSensor { sensor_id: SensorId, owner: NodeId },
    NoFreeSlots,
}

/// Result of [`TopologyManager::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    AssignedSlot(SlotIndex),
    Pending,
    Rejected(RejectReason),
}

pub struct TopologyManager {
    slot_table: HashMap<SlotIndex, NodeId>,
    nodes: HashMap<NodeId, RegisteredNode>,
    pending_queue: VecDeque<RegisteredNode>,
    sensor_owners: HashMap<SensorId, NodeId>,
    discovery_locked: bool,
    restored_slots: HashMap<NodeId, SlotIndex>,
    restored_at_us: u64,
    registration_grace_us: u64,
}

impl Default for TopologyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyManager {
    pub fn new() -> Self {
        Self {
            slot_table: HashMap::new(),
            nodes: HashMap::new(),
            pending_queue: VecDeque::new(),
            sensor_owners: HashMap::new(),
            discovery_locked: false,
            restored_slots: HashMap::new(),
            restored_at_us: 0,
            registration_grace_us: 0,
        }
    }

    pub fn lock_discovery(&mut self, locked: bool) {
        self.discovery_locked = locked;
    }

    pub fn is_discovery_locked(&self) -> bool {
        self.discovery_locked
    }

    /// Seeds a hint loaded from the persistence store at `now_us`: a node
    /// named in `hint` that sends REGISTER_REQ again within `grace_us`
    /// reuses its prior slot instead of being assigned a fresh one. The
    /// hint is never authoritative — a node that misses the window falls
    /// through to ordinary slot allocation like any other new node.
    pub fn restore_hint(&mut self, hint: &PersistedTopology, now_us: u64, grace_us: u64) {
        self.restored_slots = hint.nodes.iter().map(|n| (n.node_id, n.slot_index)).collect();
        self.restored_at_us = now_us;
        self.registration_grace_us = grace_us;
        info!(
            nodes = self.restored_slots.len(),
            grace_us, "topology hint restored, awaiting re-registration"
        );
    }

    /// Returns and consumes the node's restored slot if it is still within
    /// the grace window and that slot is not already claimed by another
    /// node. Expires the whole hint set once the window has passed.
    fn take_restored_slot(&mut self, node_id: NodeId, now_us: u64) -> Option<SlotIndex> {
        if self.restored_slots.is_empty() {
            return None;
        }
        if now_us.saturating_sub(self.restored_at_us) > self.registration_grace_us {
            self.restored_slots.clear();
            return None;
        }
        let slot = self.restored_slots.remove(&node_id)?;
        if self.slot_table.contains_key(&slot) {
            None
        } else {
            Some(slot)
        }
    }

    fn conflicting_sensor(&self, node_id: NodeId, sensor_ids: &BTreeSet<SensorId>) -> Option<RejectReason> {
        for sensor_id in sensor_ids {
            if let Some(&owner) = self.sensor_owners.get(sensor_id) {
                if owner != node_id {
                    return Some(RejectReason::DuplicateSensor {
                        sensor_id: *sensor_id,
                        owner,
                    });
                }
            }
        }
        None
    }

    fn lowest_free_slot(&self) -> Option<SlotIndex> {
        (1..MAX_SLOTS as u8)
            .map(SlotIndex::new)
            .filter_map(Result::ok)
            .find(|slot| !self.slot_table.contains_key(slot))
    }

    fn claim_slot(&mut self, node_id: NodeId, slot: SlotIndex, sensor_ids: BTreeSet<SensorId>, now_us: u64) {
        for &sensor_id in &sensor_ids {
            self.sensor_owners.insert(sensor_id, node_id);
        }
        self.slot_table.insert(slot, node_id);
        let mut node = RegisteredNode::new_pending(node_id, sensor_ids, now_us);
        node.slot_index = Some(slot);
        node.state = NodeState::Active;
        self.nodes.insert(node_id, node);
    }

    /// Idempotent on repeat REGISTER_REQ from the same node: returns the
    /// outcome it already holds rather than re-evaluating sensor conflicts
    /// against itself.
    pub fn register(&mut self, node_id: NodeId, sensor_ids: BTreeSet<SensorId>, now_us: u64) -> RegisterOutcome {
        if let Some(existing) = self.nodes.get(&node_id) {
            return match existing.slot_index {
                Some(slot) => RegisterOutcome::AssignedSlot(slot),
                None => RegisterOutcome::Pending,
            };
        }
        if self.pending_queue.iter().any(|n| n.node_id == node_id) {
            return RegisterOutcome::Pending;
        }

        if let Some(reason) = self.conflicting_sensor(node_id, &sensor_ids) {
            warn!(%node_id, "registration rejected: sensor conflict");
            return RegisterOutcome::Rejected(reason);
        }

        if let Some(slot) = self.take_restored_slot(node_id, now_us) {
            self.claim_slot(node_id, slot, sensor_ids, now_us);
            info!(%node_id, slot = slot.get(), "node re-registered, reusing persisted slot");
            return RegisterOutcome::AssignedSlot(slot);
        }

        if self.discovery_locked {
            self.pending_queue
                .push_back(RegisteredNode::new_pending(node_id, sensor_ids, now_us));
            info!(%node_id, "registration queued pending operator decision");
            return RegisterOutcome::Pending;
        }

        match self.lowest_free_slot() {
            Some(slot) => {
                self.claim_slot(node_id, slot, sensor_ids, now_us);
                info!(%node_id, slot = slot.get(), "node registered");
                RegisterOutcome::AssignedSlot(slot)
            }
            None => {
                warn!(%node_id, "registration rejected: no free slots");
                RegisterOutcome::Rejected(RejectReason::NoFreeSlots)
            }
        }
    }

    /// Dequeues a pending node and assigns it a slot.
    pub fn accept(&mut self, node_id: NodeId, now_us: u64) -> Result<SlotIndex, TopologyError> {
        let pos = self
            .pending_queue
            .iter()
            .position(|n| n.node_id == node_id)
            .ok_or(TopologyError::UnknownNode(node_id))?;
        let slot = self.lowest_free_slot().ok_or(TopologyError::NoFreeSlots)?;
        let entry = self.pending_queue.remove(pos).unwrap();
        self.claim_slot(node_id, slot, entry.sensor_ids, now_us);
        info!(%node_id, slot = slot.get(), "pending node accepted");
        Ok(slot)
    }

    /// Dequeues and discards a pending node.
    pub fn reject(&mut self, node_id: NodeId) -> Result<(), TopologyError> {
        let pos = self
            .pending_queue
            .iter()
            .position(|n| n.node_id == node_id)
            .ok_or(TopologyError::UnknownNode(node_id))?;
        self.pending_queue.remove(pos);
        info!(%node_id, "pending node rejected");
        Ok(())
    }

    pub fn heartbeat(&mut self, node_id: NodeId, now_us: u64) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.last_heard_us = now_us;
        }
    }

    /// Removes every node silent past `timeout_us`, freeing its slot and
    /// sensor claims. Returns the set of pruned node ids, one event per call.
    pub fn prune(&mut self, now_us: u64, timeout_us: u64) -> Vec<NodeId> {
        let silent: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| now_us.saturating_sub(n.last_heard_us) > timeout_us)
            .map(|(id, _)| *id)
            .collect();

        for node_id in &silent {
            if let Some(node) = self.nodes.remove(node_id) {
                if let Some(slot) = node.slot_index {
                    self.slot_table.remove(&slot);
                }
                for sensor_id in node.sensor_ids {
                    self.sensor_owners.remove(&sensor_id);
                }
                warn!(%node_id, "node pruned after liveness timeout");
            }
        }
        silent
    }

    /// Clears all registration state and returns to open discovery.
    pub fn rescan(&mut self) {
        self.nodes.clear();
        self.slot_table.clear();
        self.sensor_owners.clear();
        self.pending_queue.clear();
        self.discovery_locked = false;
        info!("topology rescan: all nodes cleared");
    }

    pub fn node(&self, node_id: NodeId) -> Option<&RegisteredNode> {
        self.nodes.get(&node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RegisteredNode> {
        self.nodes.values()
    }

    pub fn pending(&self) -> impl Iterator<Item = &RegisteredNode> {
        self.pending_queue.iter()
    }

    pub fn active_sensor_set(&self) -> BTreeSet<SensorId> {
        self.nodes.values().flat_map(|n| n.sensor_ids.iter().copied()).collect()
    }

    pub fn slot_of(&self, node_id: NodeId) -> Option<SlotIndex> {
        self.nodes.get(&node_id).and_then(|n| n.slot_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mash_types::NodeId;

    fn sensors(ids: &[u16]) -> BTreeSet<SensorId> {
        ids.iter().map(|&i| SensorId(i)).collect()
    }

    #[test]
    fn register_assigns_lowest_free_slot() {
        let mut mgr = TopologyManager::new();
        let outcome = mgr.register(NodeId::new(1).unwrap(), sensors(&[10]), 0);
        assert_eq!(outcome, RegisterOutcome::AssignedSlot(SlotIndex::new(1).unwrap()));
    }

    #[test]
    fn repeat_register_is_idempotent() {
        let mut mgr = TopologyManager::new();
        let node_id = NodeId::new(1).unwrap();
        let first = mgr.register(node_id, sensors(&[10]), 0);
        let second = mgr.register(node_id, sensors(&[10]), 100);
        assert_eq!(first, second);
    }

    #[test]
    fn conflicting_sensor_is_rejected() {
        let mut mgr = TopologyManager::new();
        mgr.register(NodeId::new(1).unwrap(), sensors(&[10]), 0);
        let outcome = mgr.register(NodeId::new(2).unwrap(), sensors(&[10]), 0);
        assert!(matches!(
            outcome,
            RegisterOutcome::Rejected(RejectReason::DuplicateSensor { .. })
        ));
    }

    #[test]
    fn locked_discovery_queues_as_pending() {
        let mut mgr = TopologyManager::new();
        mgr.lock_discovery(true);
        let outcome = mgr.register(NodeId::new(3).unwrap(), sensors(&[20]), 0);
        assert_eq!(outcome, RegisterOutcome::Pending);
        assert_eq!(mgr.pending().count(), 1);
    }

    #[test]
    fn accept_assigns_slot_and_reject_discards() {
        let mut mgr = TopologyManager::new();
        mgr.lock_discovery(true);
        mgr.register(NodeId::new(3).unwrap(), sensors(&[20]), 0);
        mgr.register(NodeId::new(4).unwrap(), sensors(&[21]), 0);

        let slot = mgr.accept(NodeId::new(3).unwrap(), 10).unwrap();
        assert_eq!(slot, SlotIndex::new(1).unwrap());
        assert!(mgr.node(NodeId::new(3).unwrap()).is_some());

        mgr.reject(NodeId::new(4).unwrap()).unwrap();
        assert!(mgr.pending().count() == 0);
        assert!(mgr.node(NodeId::new(4).unwrap()).is_none());
    }

    #[test]
    fn prune_frees_slot_and_sensors() {
        let mut mgr = TopologyManager::new();
        let node_id = NodeId::new(1).unwrap();
        mgr.register(node_id, sensors(&[10]), 0);
        let pruned = mgr.prune(10_000_000, 5_000_000);
        assert_eq!(pruned, vec![node_id]);
        assert!(mgr.node(node_id).is_none());
        assert_eq!(mgr.active_sensor_set().len(), 0);

        let outcome = mgr.register(NodeId::new(2).unwrap(), sensors(&[10]), 10_000_000);
        assert_eq!(outcome, RegisterOutcome::AssignedSlot(SlotIndex::new(1).unwrap()));
    }

    #[test]
    fn restored_hint_is_honored_within_grace_window() {
        let mut mgr = TopologyManager::new();
        let node_id = NodeId::new(1).unwrap();
        let hint = crate::persistence::PersistedTopology {
            nodes: vec![crate::persistence::PersistedNode {
                node_id,
                slot_index: SlotIndex::new(9).unwrap(),
                sensor_ids: vec![SensorId(10)],
            }],
        };
        mgr.restore_hint(&hint, 0, 10_000_000);

        // A different node registering first still gets a fresh slot.
        let other = mgr.register(NodeId::new(2).unwrap(), sensors(&[20]), 0);
        assert_eq!(other, RegisterOutcome::AssignedSlot(SlotIndex::new(1).unwrap()));

        let outcome = mgr.register(node_id, sensors(&[10]), 5_000_000);
        assert_eq!(outcome, RegisterOutcome::AssignedSlot(SlotIndex::new(9).unwrap()));
    }

    #[test]
    fn restored_hint_expires_after_grace_window() {
        let mut mgr = TopologyManager::new();
        let node_id = NodeId::new(1).unwrap();
        let hint = crate::persistence::PersistedTopology {
            nodes: vec![crate::persistence::PersistedNode {
                node_id,
                slot_index: SlotIndex::new(9).unwrap(),
                sensor_ids: vec![SensorId(10)],
            }],
        };
        mgr.restore_hint(&hint, 0, 1_000_000);

        let outcome = mgr.register(node_id, sensors(&[10]), 2_000_000);
        assert_eq!(outcome, RegisterOutcome::AssignedSlot(SlotIndex::new(1).unwrap()));
    }

    #[test]
    fn rescan_clears_everything() {
        let mut mgr = TopologyManager::new();
        mgr.register(NodeId::new(1).unwrap(), sensors(&[10]), 0);
        mgr.rescan();
        assert_eq!(mgr.nodes().count(), 0);
        assert!(!mgr.is_discovery_locked());
    }
}
