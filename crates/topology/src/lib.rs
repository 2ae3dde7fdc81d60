//! Gateway-side node registry: slot table, registration queue, liveness
//! tracking, and a best-effort persistence hint.

pub mod error;
pub mod manager;
pub mod persistence;

pub use error::{StoreError, TopologyError};
pub use manager::{RegisterOutcome, RejectReason, TopologyManager};
pub use persistence::{InMemoryStore, JsonFileStore, PersistedNode, PersistedTopology, TopologyStore};
