//! Node-side link abstraction, mirroring the gateway's `RadioLink` trait.
//! Kept separate (rather than shared) since the node must not depend on the
//! gateway crate.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

#[async_trait]
pub trait NodeRadioLink: Send + Sync {
    /// Receives the next frame addressed to this node, or broadcast by the
    /// gateway (BEACON). `None` once the link is permanently closed.
    async fn recv(&self) -> Option<Vec<u8>>;
    async fn send(&self, bytes: Vec<u8>);
}

pub struct SimulatedNodeLink {
    inbox_tx: mpsc::Sender<Vec<u8>>,
    inbox_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    sent: Mutex<VecDeque<Vec<u8>>>,
}

impl SimulatedNodeLink {
    pub fn new(capacity: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(capacity);
        Self {
            inbox_tx,
            inbox_rx: Mutex::new(inbox_rx),
            sent: Mutex::new(VecDeque::new()),
        }
    }

    pub fn injector(&self) -> mpsc::Sender<Vec<u8>> {
        self.inbox_tx.clone()
    }

    pub fn drain_sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().drain(..).collect()
    }
}

#[async_trait]
impl NodeRadioLink for SimulatedNodeLink {
    async fn recv(&self) -> Option<Vec<u8>> {
        self.inbox_rx.lock().unwrap().recv().await
    }

    async fn send(&self, bytes: Vec<u8>) {
        self.sent.lock().unwrap().push_back(bytes);
    }
}
