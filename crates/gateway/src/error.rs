//! Top-level gateway error, composed from each core's own taxonomy via
//! `#[from]`, the way the teacher composes `PipelineError`.

use mash_topology::{StoreError, TopologyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("wire codec error: {0}")]
    Codec(#[from] mash_wire::CodecError),

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("persistence store error: {0}")]
    Store(#[from] StoreError),

    #[error("command channel closed")]
    CommandChannelClosed,
}
