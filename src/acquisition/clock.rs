//! Fixed-rate sampling clock.
//!
//! Pacing is best-effort: the acquisition loop sleeps one tick interval after every read and
//! never compensates for drift. Sleeping goes through `tokio::time`, so tests running on a
//! paused runtime see the loop advance in simulated time.

use std::time::Duration;

use crate::error::{BenchError, BenchResult};

/// Default sampling frequency of the acquisition loop.
pub const DEFAULT_FREQUENCY_HZ: f64 = 10.0;

/// Timing primitive controlling the cadence of one acquisition session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleClock {
    frequency_hz: f64,
}

impl SampleClock {
    /// Create a clock ticking at `frequency_hz`.
    pub fn new(frequency_hz: f64) -> BenchResult<Self> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(BenchError::InvalidConfig(format!(
                "Sampling frequency must be positive, got {frequency_hz} Hz"
            )));
        }
        Ok(Self { frequency_hz })
    }

    /// Sampling frequency in Hz.
    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    /// Time between two consecutive reads (1 / frequency).
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency_hz)
    }

    /// Number of samples a window of `duration_s` seconds holds: floor(frequency × duration).
    ///
    /// Non-positive or non-finite durations yield zero.
    pub fn samples_for(&self, duration_s: f64) -> usize {
        let count = (self.frequency_hz * duration_s).floor();
        if count.is_finite() && count > 0.0 {
            count as usize
        } else {
            0
        }
    }

    /// Nominal elapsed time of the sample at `index`, in seconds.
    pub fn elapsed_at(&self, index: usize) -> f64 {
        index as f64 / self.frequency_hz
    }

    /// Number of ticks in one second of acquisition (at least one).
    pub fn ticks_per_second(&self) -> usize {
        (self.frequency_hz.round() as usize).max(1)
    }

    /// Wait one tick interval.
    pub async fn tick(&self) {
        tokio::time::sleep(self.tick_interval()).await;
    }
}

impl Default for SampleClock {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
        }
    }
}
