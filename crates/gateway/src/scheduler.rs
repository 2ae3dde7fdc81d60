//! Gateway-side TDMA state machine (C4) and the protocol core that ties the
//! wire codec, topology manager, sync engine and frame buffer together.
//! Pure and synchronous: every entry point is an event handed in by the
//! outer runtime (a tick, a decoded frame), mirroring how the teacher keeps
//! pipeline stages free of their own I/O.

use crate::config::GatewayConfig;
use crate::handle::{GatewayCommand, NodeStatus, StatusSnapshot};
use mash_framebuffer::{BufferPolicy, SyncFrameBuffer};
use mash_sync_engine::{ExchangeOutcome, PtpExchange, SyncEngine, SyncEngineConfig};
use mash_topology::{PersistedTopology, RegisterOutcome, TopologyManager};
use mash_types::{NodeId, NodeState, SampleFlags, SampleRecord, SensorId, SuperframeEpoch};
use mash_wire::register::RejectReason as WireRejectReason;
use mash_wire::sync_frame::SyncFrameMsg;
use mash_wire::{BeaconFrame, DataFrame, RegisterAckFrame, SyncReqFrame};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Idle,
    Discovering,
    Streaming,
}

/// Work the core wants the runtime to perform after an event. None of these
/// carry ownership of I/O — the runtime sends the frames, the core only
/// decides what they should be.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub beacon: Option<BeaconFrame>,
    pub sync_reqs: Vec<(NodeId, SyncReqFrame)>,
    pub sync_frames: Vec<SyncFrameMsg>,
}

/// Probes node ids `1..=254`, skipping `avoid` and anything already known
/// to the topology, used to resolve a REGISTER_REQ NodeId collision.
fn next_free_node_id(topology: &TopologyManager, avoid: NodeId) -> NodeId {
    for raw in 1u8..=254 {
        if let Ok(candidate) = NodeId::new(raw) {
            if candidate != avoid && topology.node(candidate).is_none() {
                return candidate;
            }
        }
    }
    NodeId::broadcast()
}

pub struct GatewayCore {
    config: GatewayConfig,
    state: GatewayState,
    epoch: SuperframeEpoch,
    topology: TopologyManager,
    sync: SyncEngine,
    buffer: SyncFrameBuffer,
    next_sync_due_us: HashMap<NodeId, u64>,
    next_beacon_due_us: u64,
}

impl GatewayCore {
    pub fn new(config: GatewayConfig) -> Self {
        let sync_config = SyncEngineConfig {
            alpha: config.ema_alpha,
            path_delay_ceiling_us: config.path_delay_ceiling_us,
            step_threshold_us: config.step_threshold_us,
            bootstrap_samples: config.bootstrap_samples,
            max_consecutive_rejects: config.max_consecutive_rejects,
        };
        let buffer = SyncFrameBuffer::new(
            config.sample_period_us,
            config.max_buckets,
            config.bucket_deadline_us,
            BufferPolicy::Live,
        );
        Self {
            state: GatewayState::Idle,
            epoch: SuperframeEpoch::default(),
            topology: TopologyManager::new(),
            sync: SyncEngine::new(sync_config),
            buffer,
            next_sync_due_us: HashMap::new(),
            next_beacon_due_us: 0,
            config,
        }
    }

    pub fn state(&self) -> GatewayState {
        self.state
    }

    /// Seeds the topology manager with a persisted hint loaded at startup,
    /// so returning nodes reuse their prior slot within the configured
    /// grace window instead of being treated as brand new.
    pub fn restore_topology_hint(&mut self, hint: PersistedTopology, now_us: u64) {
        self.topology
            .restore_hint(&hint, now_us, self.config.registration_grace_us);
    }

    pub fn apply_command(&mut self, cmd: GatewayCommand, now_us: u64) {
        match cmd {
            GatewayCommand::StartStreaming => {
                self.state = GatewayState::Streaming;
                info!("gateway starting streaming");
            }
            GatewayCommand::StopStreaming => {
                self.state = GatewayState::Idle;
                info!("gateway stopped streaming");
            }
            GatewayCommand::LockDiscovery(locked) => {
                self.topology.lock_discovery(locked);
            }
            GatewayCommand::AcceptNode(node_id) => {
                let _ = self.topology.accept(node_id, now_us);
                self.recompute_expected_sensors();
            }
            GatewayCommand::RejectNode(node_id) => {
                let _ = self.topology.reject(node_id);
            }
            GatewayCommand::RescanTopology => {
                self.topology.rescan();
                self.sync = SyncEngine::new(SyncEngineConfig {
                    alpha: self.config.ema_alpha,
                    path_delay_ceiling_us: self.config.path_delay_ceiling_us,
                    step_threshold_us: self.config.step_threshold_us,
                    bootstrap_samples: self.config.bootstrap_samples,
                    max_consecutive_rejects: self.config.max_consecutive_rejects,
                });
                self.recompute_expected_sensors();
                self.state = GatewayState::Discovering;
            }
        }
    }

    fn recompute_expected_sensors(&mut self) -> Vec<SyncFrameMsg> {
        self.buffer.set_expected_sensor_set(self.topology.active_sensor_set())
    }

    /// Handles a decoded REGISTER_REQ, returning the ACK to send back.
    pub fn on_register_req(
        &mut self,
        claimed_node_id: NodeId,
        sensor_ids: BTreeSet<SensorId>,
        now_us: u64,
    ) -> RegisterAckFrame {
        let node_id = if let Some(existing) = self.topology.node(claimed_node_id) {
            if existing.sensor_ids.is_disjoint(&sensor_ids) {
                let reassigned = next_free_node_id(&self.topology, claimed_node_id);
                info!(%claimed_node_id, %reassigned, "resolved NodeId collision on registration");
                reassigned
            } else {
                claimed_node_id
            }
        } else {
            claimed_node_id
        };

        let outcome = self.topology.register(node_id, sensor_ids, now_us);
        self.recompute_expected_sensors();

        match outcome {
            RegisterOutcome::AssignedSlot(slot) => RegisterAckFrame::Assigned { node_id, slot_index: slot },
            RegisterOutcome::Pending => RegisterAckFrame::Pending { node_id },
            RegisterOutcome::Rejected(reason) => {
                let wire_reason = match reason {
                    mash_topology::RejectReason::DuplicateSensor { .. } => WireRejectReason::DuplicateSensor,
                    mash_topology::RejectReason::NoFreeSlots => WireRejectReason::NoFreeSlots,
                };
                RegisterAckFrame::Rejected {
                    node_id,
                    reason: wire_reason,
                }
            }
        }
    }

    /// Handles a decoded SYNC_RESP, `t4_us` being the gateway's own receipt
    /// timestamp stamped the instant the frame lands.
    pub fn on_sync_resp(
        &mut self,
        node_id: NodeId,
        t1_us: u64,
        t2_us: u64,
        t3_us: u64,
        t4_us: u64,
    ) -> ExchangeOutcome {
        self.topology.heartbeat(node_id, t4_us);
        self.sync.process_exchange(
            node_id,
            PtpExchange {
                t1_us,
                t2_us,
                t3_us,
                t4_us,
            },
        )
    }

    /// Handles a decoded DATA frame: each record's timestamp is still in the
    /// node's own local clock domain, so the gateway applies that node's
    /// smoothed PTP offset before the sample can be bucketed alongside
    /// other nodes.
    pub fn on_data_frame(&mut self, frame: DataFrame, now_us: u64) -> Vec<SyncFrameMsg> {
        self.topology.heartbeat(frame.node_id, now_us);
        let offset_us = self.sync.smoothed_offset_us(frame.node_id);
        let mut emitted = Vec::new();
        for record in frame.records {
            let local_us = frame.base_timestamp_us as i64 + record.timestamp_delta_us as i64;
            let sample = SampleRecord {
                node_id: frame.node_id,
                sensor_id: record.sensor_id,
                sync_timestamp_us: local_us + offset_us,
                quaternion: record.quaternion,
                accel: record.accel,
                gyro: record.gyro,
                flags: SampleFlags::NONE,
            };
            emitted.extend(self.buffer.ingest(sample, now_us));
        }
        emitted
    }

    /// One outer-runtime tick: emits at most one beacon, at most one
    /// SYNC_REQ per node whose cadence window has elapsed, and flushes any
    /// buckets whose deadline has passed.
    pub fn tick(&mut self, now_us: u64) -> TickOutput {
        let mut out = TickOutput::default();

        if self.state != GatewayState::Idle && now_us >= self.next_beacon_due_us {
            self.epoch = self.epoch.next();
            out.beacon = Some(BeaconFrame {
                epoch: self.epoch,
                gateway_timestamp_us: now_us,
            });
            self.next_beacon_due_us = now_us + self.config.superframe_us;
        }

        if self.state == GatewayState::Streaming {
            let node_ids: Vec<NodeId> = self
                .topology
                .nodes()
                .filter(|n| n.state == NodeState::Active)
                .map(|n| n.node_id)
                .collect();
            for node_id in node_ids {
                let due = *self.next_sync_due_us.get(&node_id).unwrap_or(&0);
                if now_us >= due {
                    out.sync_reqs.push((node_id, SyncReqFrame { t1_us: now_us }));
                    self.next_sync_due_us.insert(node_id, now_us + self.config.sync_cadence_us);
                }
            }
        }

        out.sync_frames.extend(self.buffer.tick(now_us));

        let pruned = self.topology.prune(now_us, self.config.liveness_timeout_us);
        if !pruned.is_empty() {
            for node_id in &pruned {
                self.sync.forget(*node_id);
            }
            out.sync_frames.extend(self.recompute_expected_sensors());
            debug!(count = pruned.len(), "nodes pruned after liveness timeout");
        }

        out
    }

    pub fn status(&self, now_us: u64) -> StatusSnapshot {
        let per_node: Vec<NodeStatus> = self
            .topology
            .nodes()
            .map(|n| {
                let snap = self.sync.snapshot(n.node_id);
                NodeStatus {
                    id: n.node_id,
                    slot: n.slot_index,
                    sensor_ids: n.sensor_ids.iter().copied().collect(),
                    last_smoothed_offset_us: snap.smoothed_offset_us,
                    last_path_delay_us: snap.last_path_delay_us,
                    last_heard_ago_us: now_us.saturating_sub(n.last_heard_us),
                    consecutive_rejects: snap.consecutive_rejects,
                    state: n.state,
                }
            })
            .collect();

        let buffer = self.buffer.metrics();
        let any_active = per_node.iter().any(|n| n.state == NodeState::Active);
        let all_bootstrapped = per_node
            .iter()
            .filter(|n| n.state == NodeState::Active)
            .all(|n| self.sync.snapshot(n.id).bootstrap_remaining == 0);
        let drop_ratio_ok = if buffer.emitted_total == 0 {
            true
        } else {
            (buffer.dropped_incomplete as f64 / buffer.emitted_total as f64) < self.config.ready_drop_ratio_threshold
        };
        let no_fault = per_node
            .iter()
            .all(|n| !self.sync.snapshot(n.id).sync_fault);

        StatusSnapshot {
            per_node,
            pending_nodes: self.topology.pending().map(|n| n.node_id).collect(),
            buffer,
            ready: any_active && all_bootstrapped && drop_ratio_ok && no_fault,
        }
    }
}
