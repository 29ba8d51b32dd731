//! Current sweep controller.
//!
//! One sweep is bracketed by a single `enable_output` / `disable_output` pair. Between them the
//! controller visits every point of the `SweepConfig`: command the current, wait the settle
//! delay, sample one window, record a `SweepPoint`. A failure at any point disables the output
//! and returns `BenchError::SweepAborted` with the points collected so far.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, error, info, info_span, Instrument};

use crate::acquisition::{LeakageSampler, SampleWindow, WindowStatistics};
use crate::error::{BenchError, BenchResult};
use crate::hardware::CurrentSource;
use crate::sweep::{Direction, SweepConfig, MAX_SWEEP_POINTS};

/// Settle time between commanding a current and sampling it.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(150);

/// Result of one sweep step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    /// 0-based position in the sweep.
    pub step_index: usize,
    /// Source current commanded for this step, in amperes.
    pub commanded_current: f64,
    /// Statistics of the acquisition window, in milliamperes.
    pub statistics: WindowStatistics,
    /// Wall-clock time at which the acquisition window started.
    pub timestamp: DateTime<Local>,
    /// Raw samples, kept for the per-point artifacts.
    #[serde(skip)]
    pub window: SampleWindow,
}

impl SweepPoint {
    /// Commanded current in milliamperes.
    pub fn commanded_milliamps(&self) -> f64 {
        self.commanded_current * 1000.0
    }
}

/// Ordered points of one sweep of one device address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepSeries {
    address: u16,
    direction: Direction,
    total_steps: usize,
    points: Vec<SweepPoint>,
}

impl SweepSeries {
    /// Empty series planned for `total_steps` points.
    pub fn new(address: u16, direction: Direction, total_steps: usize) -> Self {
        Self {
            address,
            direction,
            total_steps,
            points: Vec::with_capacity(total_steps.min(MAX_SWEEP_POINTS)),
        }
    }

    pub(crate) fn push(&mut self, point: SweepPoint) {
        self.points.push(point);
    }

    /// Board address the series was measured on.
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Visiting order of the sweep.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of points the sweep was planned for.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Points in sweep order.
    pub fn points(&self) -> &[SweepPoint] {
        &self.points
    }

    /// Number of points collected.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no point was collected.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when every planned point is present.
    pub fn is_complete(&self) -> bool {
        self.points.len() == self.total_steps
    }

    /// Commanded currents in milliamperes.
    pub fn currents_ma(&self) -> Vec<f64> {
        self.points.iter().map(SweepPoint::commanded_milliamps).collect()
    }

    /// Mean leakage current of every point.
    pub fn means(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.statistics.mean).collect()
    }

    /// Mean absolute error of every point.
    pub fn mean_errors(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.statistics.mean_error).collect()
    }

    /// Standard deviation of every point.
    pub fn std_devs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.statistics.std_dev).collect()
    }
}

/// Drives the source across a sweep and samples every point.
pub struct SweepController {
    source: Arc<dyn CurrentSource>,
    sampler: LeakageSampler,
    settle_delay: Duration,
}

impl SweepController {
    /// Create a controller with the default settle delay.
    pub fn new(source: Arc<dyn CurrentSource>, sampler: LeakageSampler) -> Self {
        Self {
            source,
            sampler,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Override the settle delay.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Settle delay applied after every current command.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Run one sweep against the board at `address`.
    ///
    /// # Errors
    /// `InvalidConfig` for a sweep that fails `SweepConfig::validate`; the hardware is not
    /// touched. `SweepAborted` when the source rejects a command or a window fails. The output
    /// is disabled before returning in every case.
    pub async fn run(&self, config: &SweepConfig, address: u16) -> BenchResult<SweepSeries> {
        config.validate()?;
        let total_steps = config.total_steps();
        let mut series = SweepSeries::new(address, config.direction, total_steps);

        info!(
            address,
            total_steps,
            direction = %config.direction,
            minimum_ma = config.minimum * 1000.0,
            maximum_ma = config.maximum * 1000.0,
            "Starting sweep"
        );

        if let Err(e) = self.source.enable_output().await {
            let cause = BenchError::communication("enable_output", e);
            return Err(self
                .abort(series, 0, config.current_at(0), cause)
                .await);
        }

        for index in 0..total_steps {
            let current = config.current_at(index);
            let span = info_span!(
                "sweep_step",
                step = index + 1,
                total_steps,
                current_ma = current * 1000.0
            );
            match self
                .measure(address, index, current, config.duration)
                .instrument(span)
                .await
            {
                Ok(point) => series.push(point),
                Err(cause) => return Err(self.abort(series, index, current, cause).await),
            }
        }

        if let Err(e) = self.source.disable_output().await {
            let cause = BenchError::communication("disable_output", e);
            let last = total_steps - 1;
            error!(address, error = %cause, "Failed to disable output after sweep");
            return Err(sweep_aborted(series, last, config.current_at(last), cause));
        }

        info!(address, points = series.len(), "Sweep complete");
        Ok(series)
    }

    /// Measure a single point at `current`, with the output bracketed around it.
    ///
    /// # Errors
    /// `SweepAborted` when the measurement fails (empty series) or when the output cannot be
    /// disabled afterwards (the series holds the measured point).
    pub async fn measure_once(
        &self,
        address: u16,
        current: f64,
        duration_s: f64,
    ) -> BenchResult<SweepPoint> {
        let mut series = SweepSeries::new(address, Direction::Ascending, 1);

        if let Err(e) = self.source.enable_output().await {
            let cause = BenchError::communication("enable_output", e);
            return Err(self.abort(series, 0, current, cause).await);
        }

        let point = match self.measure(address, 0, current, duration_s).await {
            Ok(point) => point,
            Err(cause) => return Err(self.abort(series, 0, current, cause).await),
        };

        if let Err(e) = self.source.disable_output().await {
            let cause = BenchError::communication("disable_output", e);
            error!(address, error = %cause, "Failed to disable output after measurement");
            series.push(point);
            return Err(sweep_aborted(series, 0, current, cause));
        }
        Ok(point)
    }

    async fn measure(
        &self,
        address: u16,
        index: usize,
        current: f64,
        duration_s: f64,
    ) -> BenchResult<SweepPoint> {
        let readback = self
            .source
            .set_current(current)
            .await
            .map_err(|e| BenchError::communication("set_current", e))?;
        debug!(readback_ma = readback * 1000.0, "Current set");

        tokio::time::sleep(self.settle_delay).await;

        let timestamp = Local::now();
        let (window, statistics) = self.sampler.sample(address, duration_s).await?;

        Ok(SweepPoint {
            step_index: index,
            commanded_current: current,
            statistics,
            timestamp,
            window,
        })
    }

    /// Disable the output once and wrap `cause` with the sweep's progress.
    async fn abort(
        &self,
        series: SweepSeries,
        index: usize,
        current: f64,
        cause: BenchError,
    ) -> BenchError {
        error!(
            address = series.address(),
            step = index + 1,
            collected = series.len(),
            error = %cause,
            "Sweep step failed, disabling output"
        );
        if let Err(e) = self.source.disable_output().await {
            error!(error = %e, "Failed to disable output after sweep failure");
        }
        sweep_aborted(series, index, current, cause)
    }
}

fn sweep_aborted(series: SweepSeries, index: usize, current: f64, cause: BenchError) -> BenchError {
    BenchError::SweepAborted {
        address: series.address(),
        step: index + 1,
        total_steps: series.total_steps(),
        commanded_current: current,
        completed: series,
        source: Box::new(cause),
    }
}
