//! Bit-exact little-endian wire codec for the MASH gateway/node protocol.
//!
//! Every frame begins with a 1-byte type tag (see [`frame_type`]) and is
//! encoded/decoded independently — there is no shared framing layer here,
//! that's the transport's job. Decoders never panic: truncated input,
//! unexpected tags, and over-declared record counts all become
//! [`error::CodecError`] values.

pub mod beacon;
pub mod cursor;
pub mod data;
pub mod error;
pub mod fixed;
pub mod frame_type;
pub mod register;
pub mod sync;
pub mod sync_frame;

pub use beacon::BeaconFrame;
pub use data::{DataFrame, DataRecord};
pub use error::CodecError;
pub use register::{RegisterAckFrame, RegisterReqFrame, RejectReason};
pub use sync::{SyncReqFrame, SyncRespFrame};
pub use sync_frame::{SyncFrameMsg, SyncFrameRecord};
