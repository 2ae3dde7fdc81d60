//! The command/status surface the outer system drives the gateway through:
//! a command channel plus a readable shared snapshot, not a callback table.

use mash_framebuffer::BufferMetrics;
use mash_types::{NodeId, NodeState, SensorId, SlotIndex};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCommand {
    StartStreaming,
    StopStreaming,
    LockDiscovery(bool),
    AcceptNode(NodeId),
    RejectNode(NodeId),
    RescanTopology,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatus {
    pub id: NodeId,
    pub slot: Option<SlotIndex>,
    pub sensor_ids: Vec<SensorId>,
    pub last_smoothed_offset_us: i64,
    pub last_path_delay_us: i64,
    pub last_heard_ago_us: u64,
    pub consecutive_rejects: u32,
    pub state: NodeState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub per_node: Vec<NodeStatus>,
    pub pending_nodes: Vec<NodeId>,
    pub buffer: BufferMetrics,
    pub ready: bool,
}

/// Shared capability object handed to anything driving the gateway from the
/// outside (CLI, HTTP API, tests). Cloning shares the same channel and
/// status cell.
#[derive(Clone)]
pub struct GatewayHandle {
    command_tx: mpsc::Sender<GatewayCommand>,
    status: Arc<RwLock<StatusSnapshot>>,
}

impl GatewayHandle {
    pub fn new(command_tx: mpsc::Sender<GatewayCommand>) -> (Self, Arc<RwLock<StatusSnapshot>>) {
        let status = Arc::new(RwLock::new(StatusSnapshot::default()));
        (
            Self {
                command_tx,
                status: status.clone(),
            },
            status,
        )
    }

    async fn send(&self, cmd: GatewayCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            tracing::warn!("gateway command channel closed, dropping command");
        }
    }

    pub async fn start_streaming(&self) {
        self.send(GatewayCommand::StartStreaming).await;
    }

    pub async fn stop_streaming(&self) {
        self.send(GatewayCommand::StopStreaming).await;
    }

    pub async fn lock_discovery(&self, locked: bool) {
        self.send(GatewayCommand::LockDiscovery(locked)).await;
    }

    pub async fn accept_node(&self, node_id: NodeId) {
        self.send(GatewayCommand::AcceptNode(node_id)).await;
    }

    pub async fn reject_node(&self, node_id: NodeId) {
        self.send(GatewayCommand::RejectNode(node_id)).await;
    }

    pub async fn rescan_topology(&self) {
        self.send(GatewayCommand::RescanTopology).await;
    }

    pub async fn get_sync_status(&self) -> StatusSnapshot {
        self.status.read().await.clone()
    }
}
