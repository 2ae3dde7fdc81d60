//! DATA (0x22) — Node → Gateway. A batch of IMU samples captured during the
//! node's own transmit slot, each carrying an offset from the batch's base
//! timestamp so per-sample timing survives the 4-samples-per-slot cadence.

use crate::cursor::Cursor;
use crate::error::CodecError;
use crate::fixed;
use crate::frame_type;
use byteorder::{LittleEndian, WriteBytesExt};
use mash_types::{Quaternion, SensorId, Vec3};

/// One sample inside a [`DataFrame`] batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataRecord {
    pub sensor_id: SensorId,
    /// Offset in microseconds from `DataFrame::base_timestamp_us`.
    pub timestamp_delta_us: u32,
    pub quaternion: Quaternion,
    pub accel: Vec3,
    pub gyro: Vec3,
}

impl DataRecord {
    pub const WIRE_SIZE: usize = 1 + 4 + 8 + 6 + 6;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.sensor_id.0 as u8);
        out.write_u32::<LittleEndian>(self.timestamp_delta_us).unwrap();
        for v in fixed::encode_quaternion(&self.quaternion) {
            out.write_i16::<LittleEndian>(v).unwrap();
        }
        for v in fixed::encode_vec3(&self.accel) {
            out.write_i16::<LittleEndian>(v).unwrap();
        }
        for v in fixed::encode_vec3(&self.gyro) {
            out.write_i16::<LittleEndian>(v).unwrap();
        }
    }

    fn decode_from(c: &mut Cursor) -> Result<Self, CodecError> {
        let sensor_id = SensorId(c.u8()? as u16);
        let timestamp_delta_us = c.u32()?;
        let quaternion = fixed::decode_quaternion([c.i16()?, c.i16()?, c.i16()?, c.i16()?]);
        let accel = fixed::decode_vec3([c.i16()?, c.i16()?, c.i16()?]);
        let gyro = fixed::decode_vec3([c.i16()?, c.i16()?, c.i16()?]);
        Ok(Self {
            sensor_id,
            timestamp_delta_us,
            quaternion,
            accel,
            gyro,
        })
    }
}

/// A batch of samples gathered by one node during one transmit slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub node_id: mash_types::NodeId,
    pub base_timestamp_us: u64,
    pub records: Vec<DataRecord>,
}

impl DataFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.records.len() * DataRecord::WIRE_SIZE);
        out.push(frame_type::DATA);
        out.push(self.node_id.get());
        out.push(self.records.len() as u8);
        out.write_u64::<LittleEndian>(self.base_timestamp_us).unwrap();
        for r in &self.records {
            r.encode_into(&mut out);
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let tag = c.u8()?;
        if tag != frame_type::DATA {
            return Err(CodecError::WrongType {
                expected: frame_type::DATA,
                found: tag,
            });
        }
        let raw_node_id = c.u8()?;
        let count = c.u8()? as usize;
        let base_timestamp_us = c.u64()?;
        let needed = count * DataRecord::WIRE_SIZE;
        if c.remaining() < needed {
            return Err(CodecError::CountExceedsPayload {
                count,
                remaining: c.remaining(),
                per_record: DataRecord::WIRE_SIZE,
            });
        }
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(DataRecord::decode_from(&mut c)?);
        }
        let node_id = mash_types::NodeId::new(raw_node_id)
            .unwrap_or(mash_types::NodeId::unassigned());
        Ok(Self {
            node_id,
            base_timestamp_us,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(sensor: u16, delta: u32) -> DataRecord {
        DataRecord {
            sensor_id: SensorId(sensor),
            timestamp_delta_us: delta,
            quaternion: Quaternion([1.0, 0.0, 0.0, 0.0]),
            accel: Vec3([0.1, -0.2, 9.8]),
            gyro: Vec3([0.0, 0.01, -0.01]),
        }
    }

    #[test]
    fn roundtrip_single_record() {
        let f = DataFrame {
            node_id: mash_types::NodeId::new(5).unwrap(),
            base_timestamp_us: 1_000_000,
            records: vec![sample_record(1, 0)],
        };
        let decoded = DataFrame::decode(&f.encode()).unwrap();
        assert_eq!(decoded.node_id, f.node_id);
        assert_eq!(decoded.base_timestamp_us, f.base_timestamp_us);
        assert_eq!(decoded.records.len(), 1);
    }

    #[test]
    fn roundtrip_batch_of_four() {
        let f = DataFrame {
            node_id: mash_types::NodeId::new(5).unwrap(),
            base_timestamp_us: 1_000_000,
            records: (0..4).map(|i| sample_record(1, i * 5_000)).collect(),
        };
        let decoded = DataFrame::decode(&f.encode()).unwrap();
        assert_eq!(decoded.records.len(), 4);
        assert_eq!(decoded.records[3].timestamp_delta_us, 15_000);
    }

    #[test]
    fn count_exceeding_payload_is_malformed() {
        let mut bytes = DataFrame {
            node_id: mash_types::NodeId::new(5).unwrap(),
            base_timestamp_us: 1,
            records: vec![sample_record(1, 0)],
        }
        .encode();
        bytes[2] = 9;
        assert!(matches!(
            DataFrame::decode(&bytes),
            Err(CodecError::CountExceedsPayload { .. })
        ));
    }
}
