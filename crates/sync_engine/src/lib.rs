//! Monotonic clock abstraction and the two-way PTP sync engine.

pub mod clock;
pub mod engine;

pub use clock::{sync_now_us, MonotonicClock, SystemClock, TestClock};
pub use engine::{ExchangeOutcome, PtpExchange, SyncEngine, SyncEngineConfig};
