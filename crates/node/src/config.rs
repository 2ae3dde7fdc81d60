//! Node configuration, loaded from `./node.toml` with a `Default` fallback
//! when the file is absent or malformed, mirroring `GatewayConfig::load`.

use mash_types::SensorId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Sensor ids this node declares in REGISTER_REQ.
    pub sensor_ids: Vec<u16>,
    /// Superframe duration, must match the gateway's.
    pub superframe_us: u64,
    /// Slots per superframe, including the reserved beacon slot.
    pub slot_count: u8,
    /// Nominal per-sample cadence the simulated sensor source runs at.
    pub sample_period_us: u64,
    /// Width of the contention window (in slots, starting at slot 1) a
    /// REGISTER_REQ may randomly land in while unregistered.
    pub contention_window_slots: u8,
    /// Missed beacons before falling back from Registered/Listening to
    /// Unsynced.
    pub max_missed_beacons: u32,
    /// Capacity of the outbound sample queue (RECORDING policy).
    pub outbound_queue_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sensor_ids: vec![10],
            superframe_us: 20_000,
            slot_count: 16,
            sample_period_us: 5_000,
            contention_window_slots: 8,
            max_missed_beacons: 5,
            outbound_queue_capacity: 64,
        }
    }
}

impl NodeConfig {
    pub fn sensor_id_set(&self) -> Vec<SensorId> {
        self.sensor_ids.iter().map(|&raw| SensorId(raw)).collect()
    }

    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %path.display(), %err, "failed to parse node config, using defaults");
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "node config not found, using defaults");
                Self::default()
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read node config, using defaults");
                Self::default()
            }
        }
    }
}
