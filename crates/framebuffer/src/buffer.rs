//! The Sync Frame Buffer: gathers per-sensor samples into time-aligned
//! buckets and emits each as a completed [`SyncFrameMsg`] in strictly
//! increasing timestamp order.

use mash_types::{SampleFlags, SampleRecord, SensorId};
use mash_wire::sync_frame::{SyncFrameMsg, SyncFrameRecord};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::warn;

/// Eviction behavior when `MAX_BUCKETS` is reached and a brand new key
/// arrives: RECORDING drops the oldest incomplete bucket outright; LIVE
/// force-emits it as partial first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    Recording,
    Live,
}

#[derive(Debug, Clone)]
struct FrameBucket {
    first_arrival_us: u64,
    deadline_us: u64,
    partial: HashMap<SensorId, SampleRecord>,
}

/// Running counters surfaced through `get_sync_status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferMetrics {
    pub buckets_in_flight: usize,
    pub emitted_total: u64,
    pub dropped_incomplete: u64,
    pub late_samples: u64,
    pub duplicate_samples: u64,
}

pub struct SyncFrameBuffer {
    q_us: i64,
    max_buckets: usize,
    deadline_us: u64,
    policy: BufferPolicy,
    expected_sensor_set: BTreeSet<SensorId>,
    buckets: BTreeMap<i64, FrameBucket>,
    arrival_order: VecDeque<i64>,
    last_emitted_key: Option<i64>,
    frame_seq: u32,
    metrics: BufferMetrics,
}

/// Rounds `value` to the nearest multiple of `q`, ties rounding away from
/// the preceding multiple (toward positive infinity for the halfway case).
fn quantize(value: i64, q: i64) -> i64 {
    let div = value.div_euclid(q);
    let rem = value.rem_euclid(q);
    if rem * 2 >= q {
        (div + 1) * q
    } else {
        div * q
    }
}

impl SyncFrameBuffer {
    pub fn new(q_us: i64, max_buckets: usize, deadline_us: u64, policy: BufferPolicy) -> Self {
        Self {
            q_us,
            max_buckets,
            deadline_us,
            policy,
            expected_sensor_set: BTreeSet::new(),
            buckets: BTreeMap::new(),
            arrival_order: VecDeque::new(),
            last_emitted_key: None,
            frame_seq: 0,
            metrics: BufferMetrics::default(),
        }
    }

    pub fn metrics(&self) -> BufferMetrics {
        BufferMetrics {
            buckets_in_flight: self.buckets.len(),
            ..self.metrics
        }
    }

    fn to_frame(&mut self, key: i64, bucket: FrameBucket) -> SyncFrameMsg {
        let mut records: Vec<SyncFrameRecord> = self
            .expected_sensor_set
            .iter()
            .map(|&sensor_id| match bucket.partial.get(&sensor_id) {
                Some(sample) => SyncFrameRecord::from_sample(sample),
                None => {
                    let placeholder =
                        SampleRecord::absent_placeholder(sensor_id, mash_types::NodeId::broadcast(), key);
                    SyncFrameRecord::from_sample(&placeholder)
                }
            })
            .collect();
        records.sort_by_key(|r| r.sensor_id);

        self.frame_seq = self.frame_seq.wrapping_add(1);
        self.last_emitted_key = Some(key);
        self.metrics.emitted_total += 1;

        SyncFrameMsg {
            frame_seq: self.frame_seq,
            sync_timestamp_us: key as u32,
            records,
        }
    }

    fn evict_oldest(&mut self) -> Option<SyncFrameMsg> {
        let key = self.arrival_order.pop_front()?;
        let bucket = self.buckets.remove(&key)?;
        match self.policy {
            BufferPolicy::Recording => {
                self.metrics.dropped_incomplete += 1;
                None
            }
            BufferPolicy::Live => {
                self.metrics.dropped_incomplete += 1;
                Some(self.to_frame(key, bucket))
            }
        }
    }

    /// Applies one sample. Returns any frames emitted as a side effect, in
    /// emission order: an evicted bucket (if `MAX_BUCKETS` was exceeded)
    /// always precedes the bucket this sample itself completed, if any.
    pub fn ingest(&mut self, sample: SampleRecord, now_us: u64) -> Vec<SyncFrameMsg> {
        let key = quantize(sample.sync_timestamp_us, self.q_us);
        let mut out = Vec::new();

        if let Some(last) = self.last_emitted_key {
            if key <= last {
                self.metrics.late_samples += 1;
                warn!(key, last, "rejecting late sample, already past last emitted bucket");
                return out;
            }
        }

        if !self.buckets.contains_key(&key) && self.buckets.len() >= self.max_buckets {
            out.extend(self.evict_oldest());
        }

        let bucket = self.buckets.entry(key).or_insert_with(|| {
            self.arrival_order.push_back(key);
            FrameBucket {
                first_arrival_us: now_us,
                deadline_us: now_us + self.deadline_us,
                partial: HashMap::new(),
            }
        });

        if bucket.partial.contains_key(&sample.sensor_id) {
            self.metrics.duplicate_samples += 1;
            return out;
        }
        bucket.partial.insert(sample.sensor_id, sample);

        if !self.expected_sensor_set.is_empty() && bucket.partial.len() >= self.expected_sensor_set.len() {
            self.arrival_order.retain(|k| *k != key);
            let bucket = self.buckets.remove(&key).unwrap();
            out.push(self.to_frame(key, bucket));
        }

        out
    }

    /// Called periodically so buckets past their deadline emit as partial
    /// even with no new arrivals.
    pub fn tick(&mut self, now_us: u64) -> Vec<SyncFrameMsg> {
        let mut out = Vec::new();
        while let Some(&key) = self.arrival_order.front() {
            let expired = self
                .buckets
                .get(&key)
                .map(|b| b.deadline_us <= now_us)
                .unwrap_or(false);
            if !expired {
                break;
            }
            self.arrival_order.pop_front();
            if let Some(bucket) = self.buckets.remove(&key) {
                self.metrics.dropped_incomplete += 1;
                out.push(self.to_frame(key, bucket));
            }
        }
        out
    }

    /// Recomputes the expected sensor set (e.g. after the topology reports
    /// pruned nodes) and re-checks every held bucket for completeness,
    /// emitting any now-complete ones in ascending key order.
    pub fn set_expected_sensor_set(&mut self, new_set: BTreeSet<SensorId>) -> Vec<SyncFrameMsg> {
        self.expected_sensor_set = new_set;
        let mut ready: Vec<i64> = self
            .buckets
            .iter()
            .filter(|(_, b)| b.partial.len() >= self.expected_sensor_set.len() && !self.expected_sensor_set.is_empty())
            .map(|(k, _)| *k)
            .collect();
        ready.sort_unstable();

        let mut out = Vec::new();
        for key in ready {
            if let Some(bucket) = self.buckets.remove(&key) {
                self.arrival_order.retain(|k| *k != key);
                out.push(self.to_frame(key, bucket));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mash_types::{NodeId, Quaternion, Vec3};

    fn sample(sensor: u16, ts: i64) -> SampleRecord {
        SampleRecord {
            node_id: NodeId::new(1).unwrap(),
            sensor_id: SensorId(sensor),
            sync_timestamp_us: ts,
            quaternion: Quaternion([1.0, 0.0, 0.0, 0.0]),
            accel: Vec3([0.0, 0.0, 1.0]),
            gyro: Vec3::default(),
            flags: SampleFlags::NONE,
        }
    }

    #[test]
    fn single_sensor_emits_immediately() {
        let mut buf = SyncFrameBuffer::new(5_000, 32, 60_000, BufferPolicy::Recording);
        buf.set_expected_sensor_set([SensorId(10)].into_iter().collect());
        let frames = buf.ingest(sample(10, 5_000), 0);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sync_timestamp_us, 5_000);
        assert_eq!(frames[0].records.len(), 1);
        assert!(!frames[0].records[0].flags.is_absent());
    }

    #[test]
    fn two_sensors_align_to_same_bucket() {
        let mut buf = SyncFrameBuffer::new(5_000, 32, 60_000, BufferPolicy::Recording);
        buf.set_expected_sensor_set([SensorId(10), SensorId(11)].into_iter().collect());
        assert!(buf.ingest(sample(10, 50_000), 0).is_empty());
        let frames = buf.ingest(sample(11, 49_500), 1);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sync_timestamp_us, 50_000);
        assert_eq!(frames[0].records.len(), 2);
    }

    #[test]
    fn late_sample_after_emission_is_rejected() {
        let mut buf = SyncFrameBuffer::new(5_000, 32, 60_000, BufferPolicy::Recording);
        buf.set_expected_sensor_set([SensorId(10)].into_iter().collect());
        buf.ingest(sample(10, 10_000), 0);
        let result = buf.ingest(sample(10, 5_000), 1);
        assert!(result.is_empty());
        assert_eq!(buf.metrics().late_samples, 1);
    }

    #[test]
    fn duplicate_sample_is_counted_and_keeps_first() {
        let mut buf = SyncFrameBuffer::new(5_000, 32, 60_000, BufferPolicy::Recording);
        buf.set_expected_sensor_set([SensorId(10), SensorId(11)].into_iter().collect());
        buf.ingest(sample(10, 5_000), 0);
        buf.ingest(sample(10, 5_100), 1);
        assert_eq!(buf.metrics().duplicate_samples, 1);
    }

    #[test]
    fn deadline_expiry_force_emits_partial_with_absent_flag() {
        let mut buf = SyncFrameBuffer::new(5_000, 32, 60_000, BufferPolicy::Recording);
        buf.set_expected_sensor_set([SensorId(10), SensorId(11)].into_iter().collect());
        buf.ingest(sample(10, 5_000), 0);
        let frames = buf.tick(60_001);
        assert_eq!(frames.len(), 1);
        let absent_count = frames[0].records.iter().filter(|r| r.flags.is_absent()).count();
        assert_eq!(absent_count, 1);
        assert_eq!(buf.metrics().dropped_incomplete, 1);
    }

    #[test]
    fn node_prune_unblocks_held_bucket() {
        let mut buf = SyncFrameBuffer::new(5_000, 32, 60_000, BufferPolicy::Recording);
        buf.set_expected_sensor_set([SensorId(10), SensorId(11)].into_iter().collect());
        assert!(buf.ingest(sample(10, 5_000), 0).is_empty());
        let frames = buf.set_expected_sensor_set([SensorId(10)].into_iter().collect());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].records.len(), 1);
    }
}
