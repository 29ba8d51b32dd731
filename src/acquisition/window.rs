//! Sample windows and their statistics.

use serde::{Deserialize, Serialize};

/// One tick of an acquisition window.
///
/// Currents are in milliamperes once scaled by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Nominal time since the start of the window, in seconds.
    pub elapsed_s: f64,
    /// Leakage current reported by the sensor.
    pub sensor: f64,
    /// Current measured by the reference instrument.
    pub reference: f64,
    /// `reference - sensor`.
    pub error: f64,
    /// Auxiliary channel reading (board temperature), when one is configured.
    pub aux: Option<f64>,
}

impl Sample {
    /// Build a sample, deriving the per-tick error from the two readings.
    pub fn new(elapsed_s: f64, sensor: f64, reference: f64, aux: Option<f64>) -> Self {
        Self {
            elapsed_s,
            sensor,
            reference,
            error: reference - sensor,
            aux,
        }
    }
}

/// Ordered samples of one acquisition window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleWindow {
    samples: Vec<Sample>,
}

impl SampleWindow {
    /// Empty window with room for `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Append a sample. Windows are only built by the sampler and by tests.
    pub(crate) fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Samples in acquisition order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no sample was taken.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Elapsed time of every sample.
    pub fn elapsed(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.elapsed_s).collect()
    }

    /// Sensor reading of every sample.
    pub fn sensor_values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.sensor).collect()
    }

    /// Auxiliary channel of every sample, or `None` unless every sample carries one.
    pub fn aux_values(&self) -> Option<Vec<f64>> {
        if self.samples.is_empty() {
            return None;
        }
        self.samples.iter().map(|s| s.aux).collect()
    }

    /// Statistics over the window, `None` for an empty window.
    pub fn statistics(&self) -> Option<WindowStatistics> {
        WindowStatistics::from_window(self)
    }
}

/// Summary of one window's sensor readings and per-tick errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStatistics {
    /// Number of samples the statistics were computed over.
    pub count: usize,
    /// Mean sensor reading.
    pub mean: f64,
    /// Smallest sensor reading.
    pub min: f64,
    /// Largest sensor reading.
    pub max: f64,
    /// Peak-to-peak: `max - min`.
    pub ppc: f64,
    /// Absolute value of the mean per-tick error.
    pub mean_error: f64,
    /// Population standard deviation of the sensor readings.
    pub std_dev: f64,
}

impl WindowStatistics {
    /// Compute statistics over a window.
    ///
    /// `None` when the window is empty or holds a sensor reading that is not finite.
    pub fn from_window(window: &SampleWindow) -> Option<Self> {
        let samples = window.samples();
        if samples.is_empty() || samples.iter().any(|s| !s.sensor.is_finite()) {
            return None;
        }
        let n = samples.len() as f64;

        let (min, max) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), s| (lo.min(s.sensor), hi.max(s.sensor)),
        );
        // summation rounding can push the mean of near-constant data past an extremum
        let mean = (samples.iter().map(|s| s.sensor).sum::<f64>() / n)
            .max(min)
            .min(max);
        let variance = samples
            .iter()
            .map(|s| (s.sensor - mean).powi(2))
            .sum::<f64>()
            / n;
        let mean_error = (samples.iter().map(|s| s.error).sum::<f64>() / n).abs();

        Some(Self {
            count: samples.len(),
            mean,
            min,
            max,
            ppc: max - min,
            mean_error,
            std_dev: variance.sqrt(),
        })
    }
}
