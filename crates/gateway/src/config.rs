//! Gateway configuration, loaded from `./config.toml` with a `Default`
//! fallback when the file is absent or malformed — config problems are
//! recoverable, never fatal.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Superframe duration in microseconds.
    pub superframe_us: u64,
    /// Slots per superframe, including the reserved beacon slot.
    pub slot_count: u8,
    /// Nominal sample period `Q`, in microseconds — the Sync Frame
    /// Buffer's bucket quantum.
    pub sample_period_us: i64,
    /// Maximum buckets the Sync Frame Buffer holds concurrently.
    pub max_buckets: usize,
    /// Time a bucket is allowed to stay incomplete before it force-emits.
    pub bucket_deadline_us: u64,
    /// Interval between SYNC_REQ exchanges per node.
    pub sync_cadence_us: u64,
    /// EMA smoothing factor applied to post-bootstrap offset updates.
    pub ema_alpha: f64,
    /// Time since last heard-from before a node is pruned.
    pub liveness_timeout_us: u64,
    /// Leading exchanges that bypass step-rejection per node.
    pub bootstrap_samples: u8,
    /// Largest offset jump accepted post-bootstrap before rejection.
    pub step_threshold_us: i64,
    /// Largest plausible one-way path delay.
    pub path_delay_ceiling_us: i64,
    /// Consecutive rejected exchanges before a node is flagged faulted.
    pub max_consecutive_rejects: u32,
    /// Capacity of the Sync Frame output queue (LIVE policy).
    pub sync_frame_queue_capacity: usize,
    /// Capacity of the CSV recorder queue (RECORDING policy).
    pub csv_queue_capacity: usize,
    /// Window a re-registering node has before it's treated as a new node.
    pub registration_grace_us: u64,
    /// `dropped_incomplete / emitted_total` ratio above which `ready` is false.
    pub ready_drop_ratio_threshold: f64,
    /// Address the WebSocket frame sink listens on.
    pub listen_addr: String,
    /// Path the CSV recorder sink writes to, if enabled.
    pub csv_output_path: Option<String>,
    /// Path the topology persistence hint is stored at.
    pub topology_store_path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            superframe_us: 20_000,
            slot_count: 16,
            sample_period_us: 5_000,
            max_buckets: 32,
            bucket_deadline_us: 60_000,
            sync_cadence_us: 1_000_000,
            ema_alpha: 0.125,
            liveness_timeout_us: 5_000_000,
            bootstrap_samples: 3,
            step_threshold_us: 5_000,
            path_delay_ceiling_us: 50_000,
            max_consecutive_rejects: 5,
            sync_frame_queue_capacity: 64,
            csv_queue_capacity: 256,
            registration_grace_us: 10_000_000,
            ready_drop_ratio_threshold: 0.05,
            listen_addr: "127.0.0.1:7800".to_string(),
            csv_output_path: None,
            topology_store_path: "topology.json".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %path.display(), %err, "failed to parse gateway config, using defaults");
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "gateway config not found, using defaults");
                Self::default()
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read gateway config, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_default() {
        let config = GatewayConfig::load("/nonexistent/gateway_config.toml");
        assert_eq!(config, GatewayConfig::default());
    }
}
