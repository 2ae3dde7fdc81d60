//! Node-side TDMA lifecycle (C4, node half). Pure and synchronous: every
//! entry point is an event handed in by the outer runtime, mirroring the
//! gateway's `GatewayCore`.

use crate::config::NodeConfig;
use crate::sensor_source::SensorReading;
use mash_framebuffer::{PolicyQueue, QueuePolicy};
use mash_types::{NodeId, SlotIndex};
use mash_wire::{BeaconFrame, DataFrame, DataRecord, RegisterAckFrame, RegisterReqFrame, SyncReqFrame, SyncRespFrame};
use rand::Rng;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLifecycle {
    Unsynced,
    Listening,
    Registered,
    Lost,
}

pub struct NodeCore {
    config: NodeConfig,
    node_id: NodeId,
    lifecycle: NodeLifecycle,
    slot_index: Option<SlotIndex>,
    last_beacon_us: Option<u64>,
    last_beacon_seen_at_check_us: Option<u64>,
    missed_beacons: u32,
    next_slot_deadline_us: Option<u64>,
    outbound: PolicyQueue<SensorReading>,
}

impl NodeCore {
    pub fn new(config: NodeConfig, hw_address: &[u8]) -> Self {
        let node_id = NodeId::from_hw_address(hw_address);
        let capacity = config.outbound_queue_capacity;
        Self {
            config,
            node_id,
            lifecycle: NodeLifecycle::Unsynced,
            slot_index: None,
            last_beacon_us: None,
            last_beacon_seen_at_check_us: None,
            missed_beacons: 0,
            next_slot_deadline_us: None,
            outbound: PolicyQueue::new(capacity, QueuePolicy::Recording),
        }
    }

    pub fn lifecycle(&self) -> NodeLifecycle {
        self.lifecycle
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn slot_index(&self) -> Option<SlotIndex> {
        self.slot_index
    }

    pub fn dropped_samples(&self) -> u64 {
        self.outbound.dropped()
    }

    /// Handles a received BEACON: marks the node as synced to superframe
    /// phase, and if still unregistered, picks a contention slot and emits
    /// a REGISTER_REQ.
    pub fn on_beacon(&mut self, beacon: BeaconFrame, now_us: u64) -> Option<RegisterReqFrame> {
        self.missed_beacons = 0;
        self.last_beacon_us = Some(beacon.gateway_timestamp_us);
        self.last_beacon_seen_at_check_us = Some(now_us);

        if self.lifecycle == NodeLifecycle::Unsynced || self.lifecycle == NodeLifecycle::Lost {
            info!(node_id = %self.node_id, from = ?self.lifecycle, "beacon captured, entering Listening");
            self.lifecycle = NodeLifecycle::Listening;
        }

        if self.lifecycle == NodeLifecycle::Listening && self.slot_index.is_none() {
            let window = self.config.contention_window_slots.max(1) as u32;
            let max_slot = (self.config.slot_count.saturating_sub(1)).max(1) as u32;
            let chosen = rand::thread_rng().gen_range(1..=window.min(max_slot));
            debug!(node_id = %self.node_id, slot = chosen, "sending REGISTER_REQ at contention slot");
            return Some(RegisterReqFrame {
                node_id: self.node_id,
                sensor_ids: self.config.sensor_id_set(),
            });
        }

        if self.lifecycle == NodeLifecycle::Registered {
            if let Some(slot) = self.slot_index {
                self.next_slot_deadline_us =
                    Some(beacon.gateway_timestamp_us + slot.get() as u64 * self.slot_us());
            }
        }

        None
    }

    /// Handles a decoded REGISTER_ACK addressed to this node (by its current
    /// or a freshly reassigned id).
    pub fn on_register_ack(&mut self, ack: RegisterAckFrame) {
        match ack {
            RegisterAckFrame::Assigned { node_id, slot_index } => {
                self.node_id = node_id;
                self.slot_index = Some(slot_index);
                self.lifecycle = NodeLifecycle::Registered;
                info!(node_id = %self.node_id, slot = %slot_index, "registered");
            }
            RegisterAckFrame::Pending { node_id } => {
                self.node_id = node_id;
                debug!(node_id = %self.node_id, "registration pending operator acceptance");
            }
            RegisterAckFrame::Rejected { node_id, reason } => {
                self.node_id = node_id;
                debug!(node_id = %self.node_id, ?reason, "registration rejected, will retry next beacon");
            }
        }
    }

    /// Handles a SYNC_REQ, stamping t2 (receipt) and t3 (just before reply).
    /// The node performs no offset math of its own — the gateway owns the
    /// PTP estimate and applies it when it receives this node's DATA.
    pub fn on_sync_req(&self, req: SyncReqFrame, t2_us: u64, t3_us: u64) -> SyncRespFrame {
        SyncRespFrame {
            t1_us: req.t1_us,
            t2_us,
            t3_us,
        }
    }

    /// Queues samples captured since the previous poll, applying the
    /// RECORDING backpressure policy on overflow.
    pub fn accumulate(&mut self, readings: Vec<SensorReading>) {
        for reading in readings {
            self.outbound.push(reading);
        }
    }

    /// Checked once per superframe by the runtime: if the node is
    /// `Registered` and `now_us` has passed this superframe's slot
    /// deadline, drains the outbound queue into one DATA frame.
    pub fn maybe_emit_data(&mut self, now_us: u64) -> Option<DataFrame> {
        if self.lifecycle != NodeLifecycle::Registered {
            return None;
        }
        let deadline = self.next_slot_deadline_us?;
        if now_us < deadline || self.outbound.is_empty() {
            return None;
        }

        let mut readings = Vec::new();
        while let Some(reading) = self.outbound.pop() {
            readings.push(reading);
        }
        let base_timestamp_us = readings[0].local_timestamp_us;
        let records = readings
            .into_iter()
            .map(|r| DataRecord {
                sensor_id: r.sensor_id,
                timestamp_delta_us: (r.local_timestamp_us - base_timestamp_us) as u32,
                quaternion: r.quaternion,
                accel: r.accel,
                gyro: r.gyro,
            })
            .collect();

        Some(DataFrame {
            node_id: self.node_id,
            base_timestamp_us,
            records,
        })
    }

    /// Checked once per superframe. Once `max_missed_beacons` consecutive
    /// superframes pass with no beacon, the node becomes `Lost` — still
    /// holding its slot and queued samples in case a beacon arrives on the
    /// very next check. A `Lost` node that misses one more superframe falls
    /// back to `Unsynced` and clears all slot/queue state.
    pub fn check_missed_beacons(&mut self, now_us: u64) {
        let Some(last_seen) = self.last_beacon_seen_at_check_us else {
            return;
        };
        if now_us <= last_seen {
            return;
        }
        if now_us - last_seen < self.superframe_us() {
            return;
        }
        self.last_beacon_seen_at_check_us = Some(now_us);

        if self.lifecycle == NodeLifecycle::Lost {
            info!(node_id = %self.node_id, "lost node falling back to Unsynced");
            self.lifecycle = NodeLifecycle::Unsynced;
            self.slot_index = None;
            self.next_slot_deadline_us = None;
            self.missed_beacons = 0;
            while self.outbound.pop().is_some() {}
            return;
        }

        self.missed_beacons += 1;
        if self.missed_beacons >= self.config.max_missed_beacons {
            self.lifecycle = NodeLifecycle::Lost;
            info!(node_id = %self.node_id, missed = self.missed_beacons, "beacon lost, node considered lost");
        }
    }

    fn superframe_us(&self) -> u64 {
        self.config.superframe_us
    }

    fn slot_us(&self) -> u64 {
        self.config.superframe_us / self.config.slot_count.max(1) as u64
    }
}
