use thiserror::Error;

/// Decode failures. Every variant corresponds to a `Malformed` condition in
/// the error taxonomy: the frame is dropped, a counter is incremented, and
/// nothing propagates past the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame truncated: need at least {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("unknown frame type tag 0x{0:02x}")]
    UnknownType(u8),

    #[error("invalid slot index byte 0x{0:02x}")]
    InvalidSlotIndex(u8),

    #[error("declared record count {count} exceeds remaining payload ({remaining} bytes available, {per_record} bytes/record)")]
    CountExceedsPayload {
        count: usize,
        remaining: usize,
        per_record: usize,
    },

    #[error("expected frame type 0x{expected:02x}, found 0x{found:02x}")]
    WrongType { expected: u8, found: u8 },
}
