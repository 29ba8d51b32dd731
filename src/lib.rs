//! # LDC Bench Library
//!
//! Bench characterization of leakage-current detection (LDC) boards. A programmable source-meter
//! drives a known current through the board's sensor while the board's reading is sampled at a
//! fixed rate; sweeping the commanded current and comparing both channels gives the board's
//! accuracy across its range.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: The sampling clock, `LeakageSampler` and the `SampleWindow` with its
//!   per-window statistics.
//! - **`sweep`**: `SweepConfig`, the `SweepController` that steps the source through a series of
//!   currents, and the `RunOrchestrator` repeating sweeps over runs and device addresses.
//! - **`storage`**: Run directory layout, per-point and summary artifacts (SVG plots, CSV
//!   tables, JSON summary) behind the `ArtifactSink` seam.
//! - **`hardware`**: Capability traits for the source-meter and the sensor, plus a simulated
//!   bench with noise and fault injection.
//! - **`config`**: Layered configuration (defaults, TOML file, environment) using figment.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: The `BenchError` enum shared by all modules.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod storage;
pub mod sweep;

pub use config::BenchConfig;
pub use error::{BenchError, BenchResult};
