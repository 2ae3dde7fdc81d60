//! Push-model sensor acquisition seam (C sensor source). Real IMU drivers are
//! out of scope, the same way real ADC hardware is on the teacher's side —
//! this trait is what a real driver would plug into.

use mash_types::{Quaternion, SensorId, Vec3};
use std::f32::consts::PI;

/// One reading pushed by a sensor, still stamped in the node's own local
/// clock domain — the node core applies the smoothed offset when it forms
/// the synchronized timestamp carried to the gateway.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub sensor_id: SensorId,
    pub local_timestamp_us: u64,
    pub quaternion: Quaternion,
    pub accel: Vec3,
    pub gyro: Vec3,
}

pub trait SensorSource: Send {
    /// Returns every reading produced since the last call, for every
    /// declared sensor, stamped at `local_timestamp_us` (the node's own
    /// monotonic clock, not wall time).
    fn poll(&mut self, local_timestamp_us: u64) -> Vec<SensorReading>;
}

/// Deterministic test double: each sensor gets its own sine wave, keyed
/// purely on elapsed local time, the way the teacher's
/// `gen_eeg_sinusoid_data` keys each channel's waveform on `relative_micros`
/// rather than wall-clock or `rand`.
pub struct SimulatedSensorSource {
    sensor_ids: Vec<SensorId>,
    sample_period_us: u64,
    last_emitted_us: Option<u64>,
}

impl SimulatedSensorSource {
    pub fn new(sensor_ids: Vec<SensorId>, sample_period_us: u64) -> Self {
        Self {
            sensor_ids,
            sample_period_us,
            last_emitted_us: None,
        }
    }

    fn reading_at(&self, sensor_index: usize, sensor_id: SensorId, local_timestamp_us: u64) -> SensorReading {
        let t_secs = local_timestamp_us as f32 / 1_000_000.0;
        let freq = 1.0 + sensor_index as f32 * 2.0; // 1 Hz for sensor 0, 3 Hz for sensor 1, ...
        let angle = 2.0 * PI * freq * t_secs;
        let w = angle.cos();
        let x = angle.sin() * 0.1;
        SensorReading {
            sensor_id,
            local_timestamp_us,
            quaternion: Quaternion([w, x, 0.0, 0.0]),
            accel: Vec3([angle.sin() * 0.05, 0.0, 9.8]),
            gyro: Vec3([0.0, angle.cos() * 0.02, 0.0]),
        }
    }
}

impl SensorSource for SimulatedSensorSource {
    fn poll(&mut self, local_timestamp_us: u64) -> Vec<SensorReading> {
        let period = self.sample_period_us.max(1);
        let mut next_due = match self.last_emitted_us {
            Some(prev) => prev + period,
            None => local_timestamp_us,
        };
        let mut out = Vec::new();
        while next_due <= local_timestamp_us {
            for (i, &sensor_id) in self.sensor_ids.iter().enumerate() {
                out.push(self.reading_at(i, sensor_id, next_due));
            }
            self.last_emitted_us = Some(next_due);
            next_due += period;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_one_batch_per_sensor_per_period() {
        let mut source = SimulatedSensorSource::new(vec![SensorId(10), SensorId(11)], 5_000);
        let first = source.poll(0);
        assert_eq!(first.len(), 2);
        assert!(source.poll(4_999).is_empty());
        let second = source.poll(5_000);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].local_timestamp_us, 5_000);
    }

    #[test]
    fn catches_up_multiple_periods_in_one_poll() {
        let mut source = SimulatedSensorSource::new(vec![SensorId(10)], 5_000);
        source.poll(0);
        let caught_up = source.poll(17_000);
        // due at 5_000, 10_000, 15_000
        assert_eq!(caught_up.len(), 3);
    }
}
