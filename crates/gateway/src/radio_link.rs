//! Ingress/egress abstraction for whatever physical radio carries the TDMA
//! link. Real register-level radio drivers are out of scope here, the same
//! way raw IMU drivers are — this trait is the seam a real driver plugs
//! into, mirroring the teacher's `AdcDriver` trait over real ADC hardware.

use async_trait::async_trait;
use mash_types::NodeId;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

#[async_trait]
pub trait RadioLink: Send + Sync {
    /// Waits for the next frame to arrive from any node. `None` means the
    /// link has shut down.
    async fn recv(&self) -> Option<(NodeId, Vec<u8>)>;
    async fn send_to(&self, node_id: NodeId, bytes: Vec<u8>);
    async fn broadcast(&self, bytes: Vec<u8>);
}

/// Channel-backed link with no physical counterpart, for running the
/// gateway binary without real radio hardware attached. Frames can be
/// injected via [`SimulatedRadioLink::inject`] (e.g. from a test harness or
/// a future loopback-to-node transport).
pub struct SimulatedRadioLink {
    inbox_tx: mpsc::Sender<(NodeId, Vec<u8>)>,
    inbox_rx: Mutex<mpsc::Receiver<(NodeId, Vec<u8>)>>,
    sent: Mutex<VecDeque<(Option<NodeId>, Vec<u8>)>>,
}

impl SimulatedRadioLink {
    pub fn new(capacity: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(capacity);
        Self {
            inbox_tx,
            inbox_rx: Mutex::new(inbox_rx),
            sent: Mutex::new(VecDeque::new()),
        }
    }

    pub fn injector(&self) -> mpsc::Sender<(NodeId, Vec<u8>)> {
        self.inbox_tx.clone()
    }

    /// Frames the gateway has transmitted, oldest first, for tests to
    /// inspect without a real radio to decode them off.
    pub fn drain_sent(&self) -> Vec<(Option<NodeId>, Vec<u8>)> {
        self.sent.lock().unwrap().drain(..).collect()
    }
}

#[async_trait]
impl RadioLink for SimulatedRadioLink {
    async fn recv(&self) -> Option<(NodeId, Vec<u8>)> {
        self.inbox_rx.lock().unwrap().recv().await
    }

    async fn send_to(&self, node_id: NodeId, bytes: Vec<u8>) {
        self.sent.lock().unwrap().push_back((Some(node_id), bytes));
    }

    async fn broadcast(&self, bytes: Vec<u8>) {
        self.sent.lock().unwrap().push_back((None, bytes));
    }
}
