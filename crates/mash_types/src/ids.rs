//! Identifier newtypes for nodes, sensors, slots and superframes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Upper bound on slots in a superframe (slot 0 is always the beacon).
pub const MAX_SLOTS: usize = 16;

/// `NodeId` reserved to mean "no node assigned yet".
pub const NODE_ID_UNASSIGNED: u8 = 0;
/// `NodeId` reserved to address every node at once.
pub const NODE_ID_BROADCAST: u8 = 255;

/// A node identifier in `[1, 254]`. `0` and `255` are reserved, see
/// [`NODE_ID_UNASSIGNED`] and [`NODE_ID_BROADCAST`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u8);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("node id {0} is reserved (0 = unassigned, 255 = broadcast)")]
    ReservedNodeId(u8),
    #[error("slot index {0} is out of range [0, {MAX_SLOTS})")]
    SlotOutOfRange(u8),
}

impl NodeId {
    /// Builds a `NodeId`, rejecting the reserved values `0` and `255`.
    pub fn new(raw: u8) -> Result<Self, IdError> {
        if raw == NODE_ID_UNASSIGNED || raw == NODE_ID_BROADCAST {
            return Err(IdError::ReservedNodeId(raw));
        }
        Ok(Self(raw))
    }

    /// The sentinel meaning "no node assigned".
    pub const fn unassigned() -> Self {
        Self(NODE_ID_UNASSIGNED)
    }

    /// The sentinel addressing every node.
    pub const fn broadcast() -> Self {
        Self(NODE_ID_BROADCAST)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub fn is_unassigned(self) -> bool {
        self.0 == NODE_ID_UNASSIGNED
    }

    pub fn is_broadcast(self) -> bool {
        self.0 == NODE_ID_BROADCAST
    }

    /// Derives a candidate NodeId from a hash of a hardware address, folding
    /// into the valid `[1, 254]` range. Collisions are resolved by the
    /// gateway's registration handshake, not here.
    pub fn from_hw_address(addr: &[u8]) -> Self {
        let mut hash: u32 = 2166136261; // FNV-1a
        for &b in addr {
            hash ^= b as u32;
            hash = hash.wrapping_mul(16777619);
        }
        let candidate = (hash % 254) as u8 + 1;
        Self(candidate)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A globally unique sensor identifier, conventionally `base_offset + channel_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SensorId(pub u16);

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a transmit slot inside a superframe. Slot 0 is reserved for the beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub const BEACON: SlotIndex = SlotIndex(0);

    pub fn new(raw: u8) -> Result<Self, IdError> {
        if raw as usize >= MAX_SLOTS {
            return Err(IdError::SlotOutOfRange(raw));
        }
        Ok(Self(raw))
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing superframe counter, incremented once per
/// superframe by the gateway and echoed in every beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SuperframeEpoch(pub u32);

impl SuperframeEpoch {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SuperframeEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_rejects_reserved_values() {
        assert_eq!(NodeId::new(0), Err(IdError::ReservedNodeId(0)));
        assert_eq!(NodeId::new(255), Err(IdError::ReservedNodeId(255)));
        assert!(NodeId::new(1).is_ok());
        assert!(NodeId::new(254).is_ok());
    }

    #[test]
    fn slot_index_bounds() {
        assert!(SlotIndex::new((MAX_SLOTS - 1) as u8).is_ok());
        assert!(SlotIndex::new(MAX_SLOTS as u8).is_err());
    }

    #[test]
    fn superframe_epoch_wraps() {
        let e = SuperframeEpoch(u32::MAX);
        assert_eq!(e.next(), SuperframeEpoch(0));
    }

    #[test]
    fn hw_address_hash_is_in_range() {
        let id = NodeId::from_hw_address(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(id.get() >= 1 && id.get() <= 254);
    }
}
