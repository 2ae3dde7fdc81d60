//! The 1-byte type tag every on-air frame begins with. Values are part of
//! the bit-exact wire contract and must never be renumbered.

pub const BEACON: u8 = 0x10;
pub const SYNC_REQ: u8 = 0x11;
pub const SYNC_RESP: u8 = 0x12;
pub const REGISTER_REQ: u8 = 0x20;
pub const REGISTER_ACK: u8 = 0x21;
pub const DATA: u8 = 0x22;
pub const SYNC_FRAME: u8 = 0x25;
