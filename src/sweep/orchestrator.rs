//! Multi-run, multi-address batch execution.
//!
//! The orchestrator walks every device address in order and, for each, runs the sweep
//! `run_count` times. Every (address, run) pair gets its own directory and fresh series; a
//! failing run is recorded in the `BatchReport` and the batch moves on. Runs never overlap:
//! a run's artifacts are on disk before the next run touches the hardware.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{info, info_span, warn, Instrument};

use crate::error::{BenchError, BenchResult};
use crate::hardware::{CurrentSource, LeakageSensor};
use crate::storage::{ArtifactWriter, RunContext};
use crate::sweep::{SweepConfig, SweepController, SweepPoint, SweepSeries};

/// Hold time after the first interlock reset of a degauss.
pub const DEGAUSS_HOLD: Duration = Duration::from_millis(300);
/// Release time after the second interlock reset of a degauss.
pub const DEGAUSS_RELEASE: Duration = Duration::from_millis(150);

/// A run that finished with all of its artifacts.
#[derive(Debug)]
pub struct CompletedRun {
    /// Where the run's artifacts were written.
    pub context: RunContext,
    /// Collected sweep.
    pub series: SweepSeries,
    /// Every artifact file written for the run.
    pub artifacts: Vec<PathBuf>,
}

/// A run that failed, with whatever it left on disk.
#[derive(Debug)]
pub struct RunFailure {
    /// Board address of the run.
    pub device_address: u16,
    /// 1-based run number.
    pub run_index: u32,
    /// Cause of the failure. `SweepAborted` carries the failing step.
    pub error: BenchError,
    /// Per-point artifacts written from the partial series.
    pub artifacts: Vec<PathBuf>,
}

impl RunFailure {
    fn new(device_address: u16, run_index: u32, error: BenchError) -> Self {
        Self {
            device_address,
            run_index,
            error,
            artifacts: Vec::new(),
        }
    }

    /// 1-based failing step, when the failure happened inside the sweep.
    pub fn step(&self) -> Option<usize> {
        match &self.error {
            BenchError::SweepAborted { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "address {}, run {}: {} ({} partial artifacts written)",
            self.device_address,
            self.run_index,
            self.error,
            self.artifacts.len()
        )
    }
}

/// Outcome of a whole batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Number of (address, run) pairs attempted.
    pub attempts: usize,
    /// Runs that completed, in execution order.
    pub completed: Vec<CompletedRun>,
    /// Runs that failed, in execution order.
    pub failures: Vec<RunFailure>,
}

impl BatchReport {
    /// True when no run failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Completed series, in execution order.
    pub fn series(&self) -> impl Iterator<Item = &SweepSeries> {
        self.completed.iter().map(|run| &run.series)
    }
}

/// Single measurement result of [`RunOrchestrator::single_measurement`].
#[derive(Debug)]
pub struct Measurement {
    /// Directory of the measurement.
    pub context: RunContext,
    /// Measured point.
    pub point: SweepPoint,
    /// Plot and table paths.
    pub artifacts: Vec<PathBuf>,
}

/// Repeats sweeps over runs and device addresses and writes their artifacts.
pub struct RunOrchestrator {
    source: Arc<dyn CurrentSource>,
    sensor: Arc<dyn LeakageSensor>,
    controller: SweepController,
    writer: ArtifactWriter,
}

impl RunOrchestrator {
    /// Create an orchestrator. `controller` must drive the same `source`.
    pub fn new(
        source: Arc<dyn CurrentSource>,
        sensor: Arc<dyn LeakageSensor>,
        controller: SweepController,
        writer: ArtifactWriter,
    ) -> Self {
        Self {
            source,
            sensor,
            controller,
            writer,
        }
    }

    /// Artifact writer of this orchestrator.
    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    /// Run the whole batch described by `config`.
    ///
    /// # Errors
    /// Only for an invalid configuration or an unwritable `INFO.txt`; run failures are
    /// reported in the returned `BatchReport`.
    pub async fn execute(&self, config: &SweepConfig) -> BenchResult<BatchReport> {
        config.validate()?;
        let info_path = self.writer.write_info(Local::now())?;
        info!(
            info = %info_path.display(),
            addresses = ?config.device_addresses,
            run_count = config.run_count,
            total_steps = config.total_steps(),
            "Starting batch"
        );

        let mut report = BatchReport::default();
        for &address in &config.device_addresses {
            for run_index in 1..=config.run_count {
                report.attempts += 1;
                let span = info_span!("run", address, run_index);
                match self.execute_run(config, address, run_index).instrument(span).await {
                    Ok(run) => report.completed.push(run),
                    Err(failure) => {
                        warn!(%failure, "Run failed, continuing with the next one");
                        report.failures.push(failure);
                    }
                }
            }
        }

        info!(
            attempts = report.attempts,
            completed = report.completed.len(),
            failed = report.failures.len(),
            "Batch finished"
        );
        Ok(report)
    }

    async fn execute_run(
        &self,
        config: &SweepConfig,
        address: u16,
        run_index: u32,
    ) -> Result<CompletedRun, RunFailure> {
        let context = self
            .writer
            .prepare_run(address, run_index)
            .map_err(|e| RunFailure::new(address, run_index, e))?;

        if config.apply_reset {
            self.degauss()
                .await
                .map_err(|e| RunFailure::new(address, run_index, e))?;
        }

        let series = match self.controller.run(config, address).await {
            Ok(series) => series,
            Err(error) => {
                let mut failure = RunFailure::new(address, run_index, error);
                if let Some(partial) = failure.error.partial_series() {
                    failure.artifacts = self.write_partial(&context, partial.points());
                }
                return Err(failure);
            }
        };

        let mut artifacts = Vec::new();
        let written = self.write_points(&context, series.points(), &mut artifacts).and_then(
            |()| {
                artifacts.extend(self.writer.write_summary(&context, &series)?);
                Ok(())
            },
        );
        if let Err(error) = written {
            let mut failure = RunFailure::new(address, run_index, error);
            failure.artifacts = artifacts;
            return Err(failure);
        }

        info!(artifacts = artifacts.len(), "Run complete");
        Ok(CompletedRun {
            context,
            series,
            artifacts,
        })
    }

    fn write_points(
        &self,
        context: &RunContext,
        points: &[SweepPoint],
        artifacts: &mut Vec<PathBuf>,
    ) -> BenchResult<()> {
        for point in points {
            artifacts.extend(self.writer.write_point(context, point)?);
        }
        Ok(())
    }

    fn write_partial(&self, context: &RunContext, points: &[SweepPoint]) -> Vec<PathBuf> {
        let mut artifacts = Vec::new();
        if let Err(e) = self.write_points(context, points, &mut artifacts) {
            warn!(error = %e, "Failed to write artifacts of the partial sweep");
        }
        artifacts
    }

    /// Demagnetize the sensor: output off, reset interlocks, hold, reset again, release.
    pub async fn degauss(&self) -> BenchResult<()> {
        info!("Degaussing sensor");
        self.source
            .disable_output()
            .await
            .map_err(|e| BenchError::communication("disable_output", e))?;
        self.sensor
            .reset_interlocks()
            .await
            .map_err(|e| BenchError::communication("reset_interlocks", e))?;
        tokio::time::sleep(DEGAUSS_HOLD).await;
        self.sensor
            .reset_interlocks()
            .await
            .map_err(|e| BenchError::communication("reset_interlocks", e))?;
        tokio::time::sleep(DEGAUSS_RELEASE).await;
        Ok(())
    }

    /// Measure one point at `current` and write its plot and table into a fresh
    /// `<root>/<test name>-<timestamp>` directory.
    pub async fn single_measurement(
        &self,
        address: u16,
        current: f64,
        duration_s: f64,
        degauss: bool,
    ) -> BenchResult<Measurement> {
        let context = self.writer.prepare_measurement(address, Local::now())?;
        if degauss {
            self.degauss().await?;
        }
        let point = self
            .controller
            .measure_once(address, current, duration_s)
            .await?;
        let artifacts = self.writer.write_point(&context, &point)?;
        Ok(Measurement {
            context,
            point,
            artifacts,
        })
    }
}
