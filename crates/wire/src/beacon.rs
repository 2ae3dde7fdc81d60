//! BEACON (0x10) — Gateway → all. Marks superframe start.

use crate::cursor::Cursor;
use crate::error::CodecError;
use crate::frame_type;
use byteorder::{LittleEndian, WriteBytesExt};
use mash_types::SuperframeEpoch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconFrame {
    pub epoch: SuperframeEpoch,
    pub gateway_timestamp_us: u64,
}

impl BeaconFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(13);
        out.push(frame_type::BEACON);
        out.write_u32::<LittleEndian>(self.epoch.0).unwrap();
        out.write_u64::<LittleEndian>(self.gateway_timestamp_us).unwrap();
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let tag = c.u8()?;
        if tag != frame_type::BEACON {
            return Err(CodecError::WrongType {
                expected: frame_type::BEACON,
                found: tag,
            });
        }
        let epoch = SuperframeEpoch(c.u32()?);
        let gateway_timestamp_us = c.u64()?;
        Ok(Self {
            epoch,
            gateway_timestamp_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let f = BeaconFrame {
            epoch: SuperframeEpoch(42),
            gateway_timestamp_us: 123_456_789,
        };
        let bytes = f.encode();
        assert_eq!(BeaconFrame::decode(&bytes).unwrap(), f);
    }

    #[test]
    fn truncated_is_malformed() {
        let f = BeaconFrame {
            epoch: SuperframeEpoch(1),
            gateway_timestamp_us: 1,
        };
        let bytes = f.encode();
        assert!(BeaconFrame::decode(&bytes[..5]).is_err());
    }

    #[test]
    fn unknown_type_is_malformed() {
        let mut bytes = BeaconFrame {
            epoch: SuperframeEpoch(1),
            gateway_timestamp_us: 1,
        }
        .encode();
        bytes[0] = 0xFF;
        assert!(matches!(
            BeaconFrame::decode(&bytes),
            Err(CodecError::WrongType { .. })
        ));
    }
}
