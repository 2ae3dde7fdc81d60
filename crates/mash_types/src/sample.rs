//! Sample-level value types shared by the wire codec, sync buffer and sinks.

use crate::ids::{NodeId, SensorId};
use serde::{Deserialize, Serialize};

/// Unit quaternion, `[w, x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quaternion(pub [f32; 4]);

/// A 3-axis vector, used for both accelerometer and gyroscope readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3(pub [f32; 3]);

/// Per-sensor flags carried alongside a sample. Bit 0 marks the sample as a
/// placeholder inserted for a sensor absent at bucket-emission deadline
/// (see the Sync Frame Buffer's incomplete-bucket behavior).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SampleFlags(pub u8);

impl SampleFlags {
    pub const NONE: SampleFlags = SampleFlags(0);
    pub const ABSENT: SampleFlags = SampleFlags(1 << 0);

    pub fn is_absent(self) -> bool {
        self.0 & Self::ABSENT.0 != 0
    }

    pub fn with_absent(mut self) -> Self {
        self.0 |= Self::ABSENT.0;
        self
    }
}

/// A single sensor reading already expressed in the gateway's synchronized
/// time domain. This is the unit the Sync Frame Buffer ingests and the unit
/// a completed Sync Frame is built out of.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub node_id: NodeId,
    pub sensor_id: SensorId,
    pub sync_timestamp_us: i64,
    pub quaternion: Quaternion,
    pub accel: Vec3,
    pub gyro: Vec3,
    pub flags: SampleFlags,
}

impl SampleRecord {
    pub fn absent_placeholder(sensor_id: SensorId, node_id: NodeId, sync_timestamp_us: i64) -> Self {
        Self {
            node_id,
            sensor_id,
            sync_timestamp_us,
            quaternion: Quaternion::default(),
            accel: Vec3::default(),
            gyro: Vec3::default(),
            flags: SampleFlags::NONE.with_absent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_flag_roundtrips() {
        let flags = SampleFlags::NONE.with_absent();
        assert!(flags.is_absent());
        assert!(!SampleFlags::NONE.is_absent());
    }
}
