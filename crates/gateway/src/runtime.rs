//! The async driver loop. Owns the protocol core and wires it to a
//! [`RadioLink`] and the frame sinks; every decision is made by
//! [`GatewayCore`], everything here is I/O — the same split the teacher
//! keeps between `pipeline::executor::Executor` and its stage implementations.

use crate::config::GatewayConfig;
use crate::handle::{GatewayCommand, GatewayHandle, StatusSnapshot};
use crate::radio_link::RadioLink;
use crate::scheduler::GatewayCore;
use crate::sinks::CsvRecorderSink;
use mash_topology::PersistedTopology;
use mash_wire::sync_frame::SyncFrameMsg;
use mash_wire::{frame_type, CodecError, DataFrame, RegisterReqFrame, SyncRespFrame};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

pub struct GatewayRuntime {
    core: GatewayCore,
    link: Arc<dyn RadioLink>,
    command_rx: mpsc::Receiver<GatewayCommand>,
    status: Arc<RwLock<StatusSnapshot>>,
    frames_tx: broadcast::Sender<Arc<Vec<u8>>>,
    csv_sink: Option<CsvRecorderSink>,
    tick_period: Duration,
    shutdown: CancellationToken,
}

impl GatewayRuntime {
    pub fn new(
        config: GatewayConfig,
        link: Arc<dyn RadioLink>,
        frames_tx: broadcast::Sender<Arc<Vec<u8>>>,
    ) -> (Self, GatewayHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (handle, status) = GatewayHandle::new(command_tx);

        let csv_sink = config.csv_output_path.as_ref().and_then(|path| {
            match CsvRecorderSink::new(path) {
                Ok(sink) => Some(sink),
                Err(err) => {
                    error!(%err, path, "failed to open csv recorder sink, recording disabled");
                    None
                }
            }
        });

        let tick_period = Duration::from_micros(config.sample_period_us.max(1_000) as u64);
        let core = GatewayCore::new(config);

        (
            Self {
                core,
                link,
                command_rx,
                status,
                frames_tx,
                csv_sink,
                tick_period,
                shutdown: CancellationToken::new(),
            },
            handle,
        )
    }

    /// Seeds the topology manager with a hint loaded from the persistence
    /// store before the runtime starts processing registrations.
    pub fn restore_topology_hint(&mut self, hint: PersistedTopology) {
        self.core.restore_topology_hint(hint, now_us());
    }

    /// Returns the token that, once cancelled, stops [`Self::run`] after its
    /// current iteration.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(mut self) {
        let mut ticker = interval(self.tick_period);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("shutdown signal received, stopping gateway runtime");
                    break;
                }
                _ = ticker.tick() => {
                    let out = self.core.tick(now_us());
                    if let Some(beacon) = out.beacon {
                        self.link.broadcast(beacon.encode()).await;
                    }
                    for (node_id, req) in out.sync_reqs {
                        self.link.send_to(node_id, req.encode()).await;
                    }
                    self.emit_sync_frames(out.sync_frames);
                    self.publish_status().await;
                }
                incoming = self.link.recv() => {
                    match incoming {
                        Some((node_id, bytes)) => self.on_frame(node_id, bytes).await,
                        None => {
                            warn!("radio link closed, stopping gateway runtime");
                            break;
                        }
                    }
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            self.core.apply_command(cmd, now_us());
                            self.publish_status().await;
                        }
                        None => {
                            warn!("command channel closed, stopping gateway runtime");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn on_frame(&mut self, source: mash_types::NodeId, bytes: Vec<u8>) {
        let Some(&tag) = bytes.first() else {
            warn!(%source, "dropped empty frame");
            return;
        };
        match tag {
            frame_type::REGISTER_REQ => match RegisterReqFrame::decode(&bytes) {
                Ok(req) => {
                    let sensor_ids = req.sensor_ids.into_iter().collect();
                    let ack = self.core.on_register_req(req.node_id, sensor_ids, now_us());
                    info!(node_id = %req.node_id, ?ack, "registration processed");
                    self.link.send_to(source, ack.encode()).await;
                }
                Err(err) => warn!(%source, %err, "malformed REGISTER_REQ"),
            },
            frame_type::SYNC_RESP => match SyncRespFrame::decode(&bytes) {
                Ok(resp) => {
                    let t4_us = now_us();
                    let outcome = self
                        .core
                        .on_sync_resp(source, resp.t1_us, resp.t2_us, resp.t3_us, t4_us);
                    info!(%source, ?outcome, "sync exchange processed");
                }
                Err(err) => warn!(%source, %err, "malformed SYNC_RESP"),
            },
            frame_type::DATA => match DataFrame::decode(&bytes) {
                Ok(frame) => {
                    let frames = self.core.on_data_frame(frame, now_us());
                    self.emit_sync_frames(frames);
                }
                Err(err) => warn!(%source, %err, "malformed DATA frame"),
            },
            other => {
                let err = CodecError::UnknownType(other);
                warn!(%source, %err, "unexpected frame type from node");
            }
        }
    }

    fn emit_sync_frames(&mut self, frames: Vec<SyncFrameMsg>) {
        for frame in &frames {
            if let Some(sink) = self.csv_sink.as_mut() {
                if let Err(err) = sink.write_frame(frame) {
                    warn!(%err, "csv recorder sink write failed");
                }
            }
            let bytes = Arc::new(frame.encode());
            let _ = self.frames_tx.send(bytes);
        }
    }

    async fn publish_status(&self) {
        let snapshot = self.core.status(now_us());
        *self.status.write().await = snapshot;
    }
}
