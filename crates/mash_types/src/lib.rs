//! Shared domain types for the synchronized multi-node sensor fusion core.
//!
//! This crate has no I/O and no async runtime dependency: it only carries the
//! value types every other crate in the workspace (`mash_wire`, `mash_sync`,
//! `mash_topology`, `mash_framebuffer`, the gateway and node binaries) agrees on.

pub mod ids;
pub mod node;
pub mod sample;

pub use ids::{NodeId, SensorId, SlotIndex, SuperframeEpoch, MAX_SLOTS};
pub use node::{NodeState, RegisteredNode};
pub use sample::{Quaternion, SampleFlags, SampleRecord, Vec3};
