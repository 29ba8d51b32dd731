//! Timed dual-source acquisition window.
//!
//! Each tick reads the reference instrument, the leakage sensor and the optional auxiliary
//! channel in that order, then waits one clock interval. The first failed read ends the window;
//! the samples already taken travel back inside `BenchError::AcquisitionFailure`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::acquisition::{Sample, SampleClock, SampleWindow, WindowStatistics};
use crate::error::{BenchError, BenchResult};
use crate::hardware::{CurrentSource, LeakageSensor};

/// Unit handling and auxiliary channel of the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Factor converting raw sensor readings to milliamperes.
    pub sensor_scale_to_milliamps: f64,
    /// Factor converting instrument current readings to milliamperes.
    pub reference_scale_to_milliamps: f64,
    /// Board variable read alongside the leakage current (temperature), if any.
    pub aux_address: Option<u16>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            sensor_scale_to_milliamps: 1000.0,
            reference_scale_to_milliamps: 1000.0,
            aux_address: None,
        }
    }
}

/// Runs acquisition windows against injected instrument and sensor handles.
pub struct LeakageSampler {
    clock: SampleClock,
    source: Arc<dyn CurrentSource>,
    sensor: Arc<dyn LeakageSensor>,
    channels: ChannelSettings,
}

impl LeakageSampler {
    /// Create a sampler.
    pub fn new(
        clock: SampleClock,
        source: Arc<dyn CurrentSource>,
        sensor: Arc<dyn LeakageSensor>,
        channels: ChannelSettings,
    ) -> Self {
        Self {
            clock,
            source,
            sensor,
            channels,
        }
    }

    /// Clock pacing this sampler.
    pub fn clock(&self) -> SampleClock {
        self.clock
    }

    /// Unit and channel settings.
    pub fn channels(&self) -> ChannelSettings {
        self.channels
    }

    /// Acquire one window of `duration_s` seconds from the board at `address`.
    ///
    /// # Errors
    /// - `InvalidDuration` when the window would hold no sample
    /// - `AcquisitionFailure` when a read fails, carrying the partial window
    pub async fn sample(
        &self,
        address: u16,
        duration_s: f64,
    ) -> BenchResult<(SampleWindow, WindowStatistics)> {
        let expected = self.clock.samples_for(duration_s);
        if expected == 0 {
            return Err(self.invalid_duration(duration_s));
        }

        debug!(address, duration_s, expected, "Waiting for acquisition");
        let ticks_per_second = self.clock.ticks_per_second();
        let mut window = SampleWindow::with_capacity(expected);

        for index in 0..expected {
            match self.take_sample(address, index).await {
                Ok(sample) => window.push(sample),
                Err(source) => {
                    warn!(
                        address,
                        collected = window.len(),
                        expected,
                        error = %source,
                        "Acquisition window aborted"
                    );
                    return Err(BenchError::AcquisitionFailure {
                        partial: window,
                        expected,
                        source: Box::new(source),
                    });
                }
            }

            if (index + 1) % ticks_per_second == 0 {
                let latest = window.samples().last().copied();
                debug!(
                    elapsed_s = self.clock.elapsed_at(index + 1),
                    sensor_ma = latest.map(|s| s.sensor),
                    aux = latest.and_then(|s| s.aux),
                    "Acquisition progress"
                );
            }

            self.clock.tick().await;
        }

        let statistics = window
            .statistics()
            .ok_or_else(|| self.invalid_duration(duration_s))?;

        info!(
            address,
            mean_ma = statistics.mean,
            max_ma = statistics.max,
            min_ma = statistics.min,
            ppc_ma = statistics.ppc,
            mean_error_ma = statistics.mean_error,
            std_dev_ma = statistics.std_dev,
            "Window statistics"
        );

        Ok((window, statistics))
    }

    async fn take_sample(&self, address: u16, index: usize) -> BenchResult<Sample> {
        let reference = self
            .source
            .measure_current()
            .await
            .map_err(|e| BenchError::communication("measure_current", e))
            .map(|amps| amps * self.channels.reference_scale_to_milliamps)
            .and_then(|value| finite("measure_current", value))?;

        let sensor = self
            .sensor
            .read(address)
            .await
            .map_err(|e| BenchError::communication("read", e))
            .map(|amps| amps * self.channels.sensor_scale_to_milliamps)
            .and_then(|value| finite("read", value))?;

        let aux = match self.channels.aux_address {
            Some(aux_address) => Some(
                self.sensor
                    .read(aux_address)
                    .await
                    .map_err(|e| BenchError::communication("read_aux", e))
                    .and_then(|value| finite("read_aux", value))?,
            ),
            None => None,
        };

        Ok(Sample::new(self.clock.elapsed_at(index), sensor, reference, aux))
    }

    fn invalid_duration(&self, duration_s: f64) -> BenchError {
        BenchError::InvalidDuration {
            duration_s,
            frequency_hz: self.clock.frequency_hz(),
        }
    }
}

fn finite(operation: &'static str, value: f64) -> BenchResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BenchError::NonFiniteReading { operation, value })
    }
}
