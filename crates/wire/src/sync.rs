//! SYNC_REQ (0x11) and SYNC_RESP (0x12) — the two-way PTP exchange frames.

use crate::cursor::Cursor;
use crate::error::CodecError;
use crate::frame_type;
use byteorder::{LittleEndian, WriteBytesExt};

/// Gateway → node. Carries `t1`, the gateway's transmit timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReqFrame {
    pub t1_us: u64,
}

impl SyncReqFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9);
        out.push(frame_type::SYNC_REQ);
        out.write_u64::<LittleEndian>(self.t1_us).unwrap();
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let tag = c.u8()?;
        if tag != frame_type::SYNC_REQ {
            return Err(CodecError::WrongType {
                expected: frame_type::SYNC_REQ,
                found: tag,
            });
        }
        Ok(Self { t1_us: c.u64()? })
    }
}

/// Node → Gateway. Echoes `t1`, and reports the node's own `t2` (receipt)
/// and `t3` (response transmit) timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRespFrame {
    pub t1_us: u64,
    pub t2_us: u64,
    pub t3_us: u64,
}

impl SyncRespFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(25);
        out.push(frame_type::SYNC_RESP);
        out.write_u64::<LittleEndian>(self.t1_us).unwrap();
        out.write_u64::<LittleEndian>(self.t2_us).unwrap();
        out.write_u64::<LittleEndian>(self.t3_us).unwrap();
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let tag = c.u8()?;
        if tag != frame_type::SYNC_RESP {
            return Err(CodecError::WrongType {
                expected: frame_type::SYNC_RESP,
                found: tag,
            });
        }
        Ok(Self {
            t1_us: c.u64()?,
            t2_us: c.u64()?,
            t3_us: c.u64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_req_roundtrip() {
        let f = SyncReqFrame { t1_us: 10_000 };
        assert_eq!(SyncReqFrame::decode(&f.encode()).unwrap(), f);
    }

    #[test]
    fn sync_resp_roundtrip() {
        let f = SyncRespFrame {
            t1_us: 10_000,
            t2_us: 11_200,
            t3_us: 11_250,
        };
        assert_eq!(SyncRespFrame::decode(&f.encode()).unwrap(), f);
    }
}
