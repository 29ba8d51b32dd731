//! Bench hardware
//!
//! Capability traits for the source-meter and the leakage detection board, plus simulated
//! implementations used by the CLI and the test suite.

pub mod capabilities;
pub mod faults;
pub mod mock;

pub use capabilities::{CurrentSource, LeakageSensor};
pub use faults::{Fault, FaultInjector, MockRng};
pub use mock::{simulated_bench, MockLdcSensor, MockSourceMeter, LEAKAGE_ADDRESS, TEMPERATURE_ADDRESS};
