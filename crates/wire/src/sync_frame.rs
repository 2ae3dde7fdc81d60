//! SYNC_FRAME (0x25) — Gateway → frame sink. One time-aligned bucket from
//! the sync frame buffer, carrying every sensor's sample for a single
//! synchronized timestamp, with absent sensors flagged rather than omitted
//! so record count stays fixed across a stream.

use crate::cursor::Cursor;
use crate::error::CodecError;
use crate::fixed;
use crate::frame_type;
use byteorder::{LittleEndian, WriteBytesExt};
use mash_types::{SampleFlags, SampleRecord, SensorId};

#[derive(Debug, Clone, PartialEq)]
pub struct SyncFrameRecord {
    pub sensor_id: SensorId,
    pub quaternion: mash_types::Quaternion,
    pub accel: mash_types::Vec3,
    pub gyro: mash_types::Vec3,
    pub flags: SampleFlags,
}

impl SyncFrameRecord {
    pub const WIRE_SIZE: usize = 1 + 8 + 6 + 6 + 1 + 2;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.sensor_id.0 as u8);
        for v in fixed::encode_quaternion(&self.quaternion) {
            out.write_i16::<LittleEndian>(v).unwrap();
        }
        for v in fixed::encode_vec3(&self.accel) {
            out.write_i16::<LittleEndian>(v).unwrap();
        }
        for v in fixed::encode_vec3(&self.gyro) {
            out.write_i16::<LittleEndian>(v).unwrap();
        }
        out.push(self.flags.0);
        out.extend_from_slice(&[0u8, 0u8]); // reserved
    }

    fn decode_from(c: &mut Cursor) -> Result<Self, CodecError> {
        let sensor_id = SensorId(c.u8()? as u16);
        let quaternion = fixed::decode_quaternion([c.i16()?, c.i16()?, c.i16()?, c.i16()?]);
        let accel = fixed::decode_vec3([c.i16()?, c.i16()?, c.i16()?]);
        let gyro = fixed::decode_vec3([c.i16()?, c.i16()?, c.i16()?]);
        let flags = SampleFlags(c.u8()?);
        let _reserved = c.bytes(2)?;
        Ok(Self {
            sensor_id,
            quaternion,
            accel,
            gyro,
            flags,
        })
    }

    pub fn from_sample(sample: &SampleRecord) -> Self {
        Self {
            sensor_id: sample.sensor_id,
            quaternion: sample.quaternion,
            accel: sample.accel,
            gyro: sample.gyro,
            flags: sample.flags,
        }
    }
}

/// A fully time-aligned bucket: one record per sensor the topology expects,
/// in ascending sensor-id order.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFrameMsg {
    pub frame_seq: u32,
    pub sync_timestamp_us: u32,
    pub records: Vec<SyncFrameRecord>,
}

impl SyncFrameMsg {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.records.len() * SyncFrameRecord::WIRE_SIZE);
        out.push(frame_type::SYNC_FRAME);
        out.write_u32::<LittleEndian>(self.frame_seq).unwrap();
        out.write_u32::<LittleEndian>(self.sync_timestamp_us).unwrap();
        out.push(self.records.len() as u8);
        for r in &self.records {
            r.encode_into(&mut out);
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let tag = c.u8()?;
        if tag != frame_type::SYNC_FRAME {
            return Err(CodecError::WrongType {
                expected: frame_type::SYNC_FRAME,
                found: tag,
            });
        }
        let frame_seq = c.u32()?;
        let sync_timestamp_us = c.u32()?;
        let count = c.u8()? as usize;
        let needed = count * SyncFrameRecord::WIRE_SIZE;
        if c.remaining() < needed {
            return Err(CodecError::CountExceedsPayload {
                count,
                remaining: c.remaining(),
                per_record: SyncFrameRecord::WIRE_SIZE,
            });
        }
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(SyncFrameRecord::decode_from(&mut c)?);
        }
        Ok(Self {
            frame_seq,
            sync_timestamp_us,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mash_types::{NodeId, Quaternion, Vec3};

    fn sample(sensor: u16, absent: bool) -> SampleRecord {
        let mut s = SampleRecord {
            node_id: NodeId::new(1).unwrap(),
            sensor_id: SensorId(sensor),
            sync_timestamp_us: 0,
            quaternion: Quaternion([1.0, 0.0, 0.0, 0.0]),
            accel: Vec3([0.0, 0.0, 1.0]),
            gyro: Vec3([0.0, 0.0, 0.0]),
            flags: SampleFlags::NONE,
        };
        if absent {
            s.flags = s.flags.with_absent();
        }
        s
    }

    #[test]
    fn roundtrip_with_absent_sensor() {
        let f = SyncFrameMsg {
            frame_seq: 7,
            sync_timestamp_us: 20_000,
            records: vec![
                SyncFrameRecord::from_sample(&sample(1, false)),
                SyncFrameRecord::from_sample(&sample(2, true)),
            ],
        };
        let decoded = SyncFrameMsg::decode(&f.encode()).unwrap();
        assert_eq!(decoded, f);
        assert!(decoded.records[1].flags.is_absent());
        assert!(!decoded.records[0].flags.is_absent());
    }

    #[test]
    fn count_exceeding_payload_is_malformed() {
        let mut bytes = SyncFrameMsg {
            frame_seq: 1,
            sync_timestamp_us: 1,
            records: vec![SyncFrameRecord::from_sample(&sample(1, false))],
        }
        .encode();
        bytes[9] = 9;
        assert!(matches!(
            SyncFrameMsg::decode(&bytes),
            Err(CodecError::CountExceedsPayload { .. })
        ));
    }
}
