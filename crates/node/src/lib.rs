pub mod config;
pub mod error;
pub mod radio_link;
pub mod runtime;
pub mod sensor_source;
pub mod state_machine;

pub use config::NodeConfig;
pub use error::NodeError;
pub use radio_link::{NodeRadioLink, SimulatedNodeLink};
pub use runtime::NodeRuntime;
pub use sensor_source::{SensorReading, SensorSource, SimulatedSensorSource};
pub use state_machine::{NodeCore, NodeLifecycle};
