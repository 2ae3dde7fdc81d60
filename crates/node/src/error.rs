//! Top-level node error, composed from the wire codec's own taxonomy via
//! `#[from]`, mirroring how the gateway composes `GatewayError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("wire codec error: {0}")]
    Codec(#[from] mash_wire::CodecError),

    #[error("radio link closed")]
    LinkClosed,
}
