//! Current sweeps and the batch orchestrator that repeats them.

pub mod config;
pub mod controller;
pub mod orchestrator;

pub use config::{Direction, SweepConfig, MAX_SWEEP_POINTS};
pub use controller::{SweepController, SweepPoint, SweepSeries, DEFAULT_SETTLE_DELAY};
pub use orchestrator::{
    BatchReport, CompletedRun, Measurement, RunFailure, RunOrchestrator, DEGAUSS_HOLD,
    DEGAUSS_RELEASE,
};
