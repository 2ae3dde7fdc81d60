//! Async driver loop tying the node's TDMA state machine, its radio link and
//! its sensor source together, mirroring `GatewayRuntime`'s `tokio::select!`
//! structure.

use crate::radio_link::NodeRadioLink;
use crate::sensor_source::SensorSource;
use crate::state_machine::NodeCore;
use mash_wire::{BeaconFrame, CodecError, RegisterAckFrame, SyncReqFrame};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_micros() as u64
}

pub struct NodeRuntime {
    core: NodeCore,
    link: Arc<dyn NodeRadioLink>,
    sensor_source: Box<dyn SensorSource>,
    poll_period: Duration,
    shutdown: CancellationToken,
}

impl NodeRuntime {
    pub fn new(
        core: NodeCore,
        link: Arc<dyn NodeRadioLink>,
        sensor_source: Box<dyn SensorSource>,
        sample_period_us: u64,
    ) -> Self {
        Self {
            core,
            link,
            sensor_source,
            poll_period: Duration::from_micros(sample_period_us.max(1_000)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns the token that, once cancelled, stops [`Self::run`] after its
    /// current iteration.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_period);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("shutdown signal received, stopping node runtime");
                    break;
                }
                _ = ticker.tick() => {
                    let now = now_us();
                    let readings = self.sensor_source.poll(now);
                    self.core.accumulate(readings);
                    self.core.check_missed_beacons(now);
                    if let Some(frame) = self.core.maybe_emit_data(now) {
                        self.link.send(frame.encode()).await;
                    }
                }
                frame = self.link.recv() => {
                    match frame {
                        Some(bytes) => self.on_frame(bytes).await,
                        None => {
                            warn!("node radio link closed, stopping runtime");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn on_frame(&mut self, bytes: Vec<u8>) {
        match bytes.first().copied() {
            Some(mash_wire::frame_type::BEACON) => match BeaconFrame::decode(&bytes) {
                Ok(beacon) => {
                    if let Some(req) = self.core.on_beacon(beacon, now_us()) {
                        self.link.send(req.encode()).await;
                    }
                }
                Err(err) => warn!(%err, "failed to decode BEACON"),
            },
            Some(mash_wire::frame_type::REGISTER_ACK) => match RegisterAckFrame::decode(&bytes) {
                Ok(ack) => self.core.on_register_ack(ack),
                Err(err) => warn!(%err, "failed to decode REGISTER_ACK"),
            },
            Some(mash_wire::frame_type::SYNC_REQ) => match SyncReqFrame::decode(&bytes) {
                Ok(req) => {
                    let t2 = now_us();
                    let t3 = now_us();
                    let resp = self.core.on_sync_req(req, t2, t3);
                    self.link.send(resp.encode()).await;
                }
                Err(err) => warn!(%err, "failed to decode SYNC_REQ"),
            },
            Some(other) => {
                let err = CodecError::UnknownType(other);
                warn!(%err, "node received unexpected frame type");
            }
            None => warn!("node received empty frame"),
        }
    }
}
