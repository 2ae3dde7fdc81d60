//! REGISTER_REQ (0x20) and REGISTER_ACK (0x21) — node admission.

use crate::cursor::Cursor;
use crate::error::CodecError;
use crate::frame_type;
use byteorder::{LittleEndian, WriteBytesExt};
use mash_types::{NodeId, SensorId, SlotIndex};

const NO_SLOT: u8 = 0xFF;

/// Node → Gateway. Claims a `NodeId` and declares the sensor set it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterReqFrame {
    pub node_id: NodeId,
    pub sensor_ids: Vec<SensorId>,
}

impl RegisterReqFrame {
    const SENSOR_ID_SIZE: usize = 2;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + self.sensor_ids.len() * Self::SENSOR_ID_SIZE);
        out.push(frame_type::REGISTER_REQ);
        out.push(self.node_id.get());
        out.push(self.sensor_ids.len() as u8);
        for s in &self.sensor_ids {
            out.write_u16::<LittleEndian>(s.0).unwrap();
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let tag = c.u8()?;
        if tag != frame_type::REGISTER_REQ {
            return Err(CodecError::WrongType {
                expected: frame_type::REGISTER_REQ,
                found: tag,
            });
        }
        let raw_node_id = c.u8()?;
        let count = c.u8()? as usize;
        let needed = count * Self::SENSOR_ID_SIZE;
        if c.remaining() < needed {
            return Err(CodecError::CountExceedsPayload {
                count,
                remaining: c.remaining(),
                per_record: Self::SENSOR_ID_SIZE,
            });
        }
        let mut sensor_ids = Vec::with_capacity(count);
        for _ in 0..count {
            sensor_ids.push(SensorId(c.u16()?));
        }
        // NodeId::new rejects the reserved 0/255 values; a node that has not
        // yet claimed an id sends 0, which the gateway treats as "assign me one".
        let node_id = NodeId::new(raw_node_id).unwrap_or(NodeId::unassigned());
        Ok(Self {
            node_id,
            sensor_ids,
        })
    }
}

/// Why a REGISTER_REQ was refused a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    None,
    DuplicateSensor,
    NoFreeSlots,
    OperatorReject,
}

impl RejectReason {
    fn to_code(self) -> u8 {
        match self {
            RejectReason::None => 0,
            RejectReason::DuplicateSensor => 1,
            RejectReason::NoFreeSlots => 2,
            RejectReason::OperatorReject => 3,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => RejectReason::DuplicateSensor,
            2 => RejectReason::NoFreeSlots,
            3 => RejectReason::OperatorReject,
            _ => RejectReason::None,
        }
    }
}

/// Gateway → node. Assigns a slot, places the node in the pending queue, or
/// rejects the request outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAckFrame {
    Assigned {
        node_id: NodeId,
        slot_index: SlotIndex,
    },
    Pending {
        node_id: NodeId,
    },
    Rejected {
        node_id: NodeId,
        reason: RejectReason,
    },
}

impl RegisterAckFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5);
        out.push(frame_type::REGISTER_ACK);
        match *self {
            RegisterAckFrame::Assigned {
                node_id,
                slot_index,
            } => {
                out.push(0);
                out.push(node_id.get());
                out.push(slot_index.get());
                out.push(RejectReason::None.to_code());
            }
            RegisterAckFrame::Pending { node_id } => {
                out.push(1);
                out.push(node_id.get());
                out.push(NO_SLOT);
                out.push(RejectReason::None.to_code());
            }
            RegisterAckFrame::Rejected { node_id, reason } => {
                out.push(2);
                out.push(node_id.get());
                out.push(NO_SLOT);
                out.push(reason.to_code());
            }
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let tag = c.u8()?;
        if tag != frame_type::REGISTER_ACK {
            return Err(CodecError::WrongType {
                expected: frame_type::REGISTER_ACK,
                found: tag,
            });
        }
        let result_code = c.u8()?;
        let raw_node_id = c.u8()?;
        let slot_raw = c.u8()?;
        let reason_code = c.u8()?;
        let node_id = NodeId::new(raw_node_id).unwrap_or(NodeId::unassigned());
        Ok(match result_code {
            0 => RegisterAckFrame::Assigned {
                node_id,
                slot_index: SlotIndex::new(slot_raw).map_err(|_| CodecError::InvalidSlotIndex(slot_raw))?,
            },
            1 => RegisterAckFrame::Pending { node_id },
            _ => RegisterAckFrame::Rejected {
                node_id,
                reason: RejectReason::from_code(reason_code),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_req_roundtrip() {
        let f = RegisterReqFrame {
            node_id: NodeId::new(3).unwrap(),
            sensor_ids: vec![SensorId(10), SensorId(11)],
        };
        assert_eq!(RegisterReqFrame::decode(&f.encode()).unwrap(), f);
    }

    #[test]
    fn register_req_count_exceeding_payload_is_malformed() {
        let mut bytes = RegisterReqFrame {
            node_id: NodeId::new(3).unwrap(),
            sensor_ids: vec![SensorId(10)],
        }
        .encode();
        bytes[2] = 5; // claim 5 sensors while only 1 is present
        assert!(matches!(
            RegisterReqFrame::decode(&bytes),
            Err(CodecError::CountExceedsPayload { .. })
        ));
    }

    #[test]
    fn register_ack_assigned_with_out_of_range_slot_is_invalid_slot_index() {
        let mut bytes = RegisterAckFrame::Assigned {
            node_id: NodeId::new(3).unwrap(),
            slot_index: SlotIndex::new(2).unwrap(),
        }
        .encode();
        bytes[3] = 200; // past MAX_SLOTS
        assert!(matches!(
            RegisterAckFrame::decode(&bytes),
            Err(CodecError::InvalidSlotIndex(200))
        ));
    }

    #[test]
    fn register_ack_variants_roundtrip() {
        let variants = [
            RegisterAckFrame::Assigned {
                node_id: NodeId::new(3).unwrap(),
                slot_index: SlotIndex::new(2).unwrap(),
            },
            RegisterAckFrame::Pending {
                node_id: NodeId::new(3).unwrap(),
            },
            RegisterAckFrame::Rejected {
                node_id: NodeId::new(3).unwrap(),
                reason: RejectReason::NoFreeSlots,
            },
        ];
        for v in variants {
            assert_eq!(RegisterAckFrame::decode(&v.encode()).unwrap(), v);
        }
    }
}
