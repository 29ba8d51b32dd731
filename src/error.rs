//! Custom error types for the bench.
//!
//! This module defines `BenchError`, the single error type returned by the acquisition and
//! sweep engine. Using the `thiserror` crate, it gives every layer a consistent way to report
//! failures while keeping the partial data a failed operation had already collected.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidDuration`**: an acquisition window would contain zero samples.
//! - **`AcquisitionFailure`**: a device read failed mid-window. Carries the partial window.
//! - **`SweepAborted`**: the instrument rejected a command or a step failed. Carries every
//!   sweep point collected before the failure.
//! - **`NonFiniteReading`**: a device returned NaN or an infinity.
//! - **`DirectoryExists`**: a run directory is already present on disk.
//! - **`Communication`**: a driver call failed. The driver error is kept as the source.
//! - **`InvalidConfig`** / **`Config`**: semantic and parse errors in the configuration.
//! - **`Io`**, **`Table`**, **`MalformedTable`**, **`Plot`**, **`IncompleteSeries`**,
//!   **`ColumnLength`**: artifact output problems.
//!
//! Driver capability traits report failures with `anyhow::Error`; `BenchError::communication`
//! wraps them together with the name of the operation that failed.

use std::path::PathBuf;

use thiserror::Error;

use crate::acquisition::SampleWindow;
use crate::sweep::SweepSeries;

/// Convenience alias for results using the bench error type.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Boxed driver error kept as the source of a communication failure.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    InvalidConfig(String),

    #[error(
        "Acquisition window of {duration_s} s at {frequency_hz} Hz contains no samples"
    )]
    InvalidDuration { duration_s: f64, frequency_hz: f64 },

    #[error("Acquisition failed after {} of {expected} samples: {source}", .partial.len())]
    AcquisitionFailure {
        /// Samples collected before the failing read.
        partial: SampleWindow,
        expected: usize,
        #[source]
        source: Box<BenchError>,
    },

    #[error(
        "Sweep aborted at address {address}, step {step} of {total_steps} \
         ({:.3} mA) with {} points collected: {source}",
        .commanded_current * 1000.0,
        .completed.len()
    )]
    SweepAborted {
        address: u16,
        /// 1-based number of the step that failed.
        step: usize,
        total_steps: usize,
        /// Commanded source current of the failed step, in amperes.
        commanded_current: f64,
        /// Every point collected before the failure, in sweep order.
        completed: SweepSeries,
        #[source]
        source: Box<BenchError>,
    },

    #[error("{operation} returned a non-finite reading: {value}")]
    NonFiniteReading { operation: &'static str, value: f64 },

    #[error("Run directory already exists: {}", .0.display())]
    DirectoryExists(PathBuf),

    #[error("Communication error during {operation}: {source}")]
    Communication {
        operation: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("Sweep series holds {actual} points but {expected} steps were planned")]
    IncompleteSeries { expected: usize, actual: usize },

    #[error("Column '{column}' holds {actual} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table error: {0}")]
    Table(#[from] csv::Error),

    #[error("Malformed table {}: line {line}: {message}", .path.display())]
    MalformedTable {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("Plot rendering error: {0}")]
    Plot(String),
}

impl BenchError {
    /// Wrap a driver failure with the name of the operation that produced it.
    pub fn communication(operation: &'static str, err: anyhow::Error) -> Self {
        BenchError::Communication {
            operation,
            source: err.into(),
        }
    }

    /// Sweep points that were collected before this error, if it carries any.
    pub fn partial_series(&self) -> Option<&SweepSeries> {
        match self {
            BenchError::SweepAborted { completed, .. } => Some(completed),
            _ => None,
        }
    }

    /// Samples that were collected before this error, if it carries any.
    ///
    /// Looks through a `SweepAborted` into the acquisition failure that caused it.
    pub fn partial_window(&self) -> Option<&SampleWindow> {
        match self {
            BenchError::AcquisitionFailure { partial, .. } => Some(partial),
            BenchError::SweepAborted { source, .. } => source.partial_window(),
            _ => None,
        }
    }
}

impl From<figment::Error> for BenchError {
    fn from(value: figment::Error) -> Self {
        BenchError::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::Sample;
    use crate::sweep::Direction;

    #[test]
    fn communication_keeps_driver_message() {
        let err = BenchError::communication("set_current", anyhow::anyhow!("port closed"));
        let text = err.to_string();
        assert!(text.contains("set_current"));
        assert!(text.contains("port closed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn acquisition_failure_reports_progress() {
        let mut partial = SampleWindow::with_capacity(10);
        partial.push(Sample::new(0.0, 1.0, 1.1, None));
        partial.push(Sample::new(0.1, 1.0, 1.1, None));
        let err = BenchError::AcquisitionFailure {
            partial,
            expected: 10,
            source: Box::new(BenchError::communication(
                "read",
                anyhow::anyhow!("timeout"),
            )),
        };
        assert!(err.to_string().contains("after 2 of 10 samples"));
        assert_eq!(err.partial_window().map(SampleWindow::len), Some(2));
    }

    #[test]
    fn sweep_aborted_exposes_partial_series() {
        let completed = SweepSeries::new(53, Direction::Ascending, 5);
        let err = BenchError::SweepAborted {
            address: 53,
            step: 3,
            total_steps: 5,
            commanded_current: 0.002,
            completed,
            source: Box::new(BenchError::communication(
                "set_current",
                anyhow::anyhow!("rejected"),
            )),
        };
        let text = err.to_string();
        assert!(text.contains("address 53, step 3 of 5"));
        assert!(text.contains("2.000 mA"));
        assert_eq!(err.partial_series().map(SweepSeries::len), Some(0));
        assert!(err.partial_window().is_none());
    }
}
