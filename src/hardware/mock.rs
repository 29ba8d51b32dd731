//! Mock Hardware Implementations
//!
//! Simulated bench devices for running sweeps without physical hardware.
//! All mock devices use async-safe state (tokio::sync::RwLock) and never block the runtime.
//!
//! # Available Mocks
//!
//! - `MockSourceMeter` - Programmable source with compliance range and readback noise
//! - `MockLdcSensor` - Leakage detection board that observes the source's output current
//!
//! # Behavior
//!
//! - Output current is zero while the output is disabled
//! - The sensor reports `gain * I + offset + noise` in amperes on every leakage address
//! - The temperature address reports an ambient value drifting with every read
//! - Every operation can be made to fail through a `FaultInjector`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::hardware::capabilities::{CurrentSource, LeakageSensor};
use crate::hardware::faults::{Fault, FaultInjector, MockRng};

/// Default address of the leakage current variable on the board.
pub const LEAKAGE_ADDRESS: u16 = 53;

/// Default address of the board temperature variable.
pub const TEMPERATURE_ADDRESS: u16 = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceMode {
    Current,
    Voltage,
}

#[derive(Debug)]
struct SourceState {
    mode: SourceMode,
    output_enabled: bool,
    current_setpoint: f64,
    voltage_setpoint: f64,
    protection_voltage: f64,
    protection_current: f64,
}

// =============================================================================
// MockSourceMeter - Simulated programmable source
// =============================================================================

/// Mock source-meter with a symmetric current compliance range.
///
/// # Example
///
/// ```rust,ignore
/// let source = MockSourceMeter::new().with_noise(1e-6, Some(7));
/// source.enable_output().await?;
/// source.set_current(0.002).await?;
/// assert!((source.measure_current().await? - 0.002).abs() < 1e-5);
/// ```
#[derive(Debug)]
pub struct MockSourceMeter {
    state: RwLock<SourceState>,
    max_current: f64,
    max_voltage: f64,
    load_ohms: f64,
    noise_amps: f64,
    rng: MockRng,
    faults: FaultInjector,
    output_transitions: AtomicUsize,
}

impl MockSourceMeter {
    /// Noise-free source with a ±1 A / ±20 V range driving a 10 Ω load.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SourceState {
                mode: SourceMode::Current,
                output_enabled: false,
                current_setpoint: 0.0,
                voltage_setpoint: 0.0,
                protection_voltage: 20.0,
                protection_current: 1.0,
            }),
            max_current: 1.0,
            max_voltage: 20.0,
            load_ohms: 10.0,
            noise_amps: 0.0,
            rng: MockRng::new(None),
            faults: FaultInjector::none(),
            output_transitions: AtomicUsize::new(0),
        }
    }

    /// Add uniform readback noise of ±`amps` to current measurements.
    pub fn with_noise(mut self, amps: f64, seed: Option<u64>) -> Self {
        self.noise_amps = amps;
        self.rng = MockRng::new(seed);
        self
    }

    /// Limit the commandable current to ±`amps`.
    pub fn with_max_current(mut self, amps: f64) -> Self {
        self.max_current = amps;
        self
    }

    /// Install a fault scenario.
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Number of calls made to `operation` (failed calls included).
    pub fn calls(&self, operation: &str) -> usize {
        self.faults.calls(operation)
    }

    /// Number of times the output actually changed state.
    pub fn output_transitions(&self) -> usize {
        self.output_transitions.load(Ordering::SeqCst)
    }

    /// Whether the output is currently on.
    pub async fn is_output_enabled(&self) -> bool {
        self.state.read().await.output_enabled
    }

    /// Current actually flowing through the load, without readback noise.
    pub async fn output_current(&self) -> f64 {
        let state = self.state.read().await;
        if !state.output_enabled {
            return 0.0;
        }
        match state.mode {
            SourceMode::Current => state.current_setpoint,
            SourceMode::Voltage => state.voltage_setpoint / self.load_ohms,
        }
    }

    async fn set_output(&self, enabled: bool) {
        let mut state = self.state.write().await;
        if state.output_enabled != enabled {
            self.output_transitions.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(enabled, "MockSourceMeter: output state changed");
        }
        state.output_enabled = enabled;
    }
}

impl Default for MockSourceMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CurrentSource for MockSourceMeter {
    async fn set_current(&self, amps: f64) -> Result<f64> {
        self.faults.check("set_current")?;
        let limit = self.max_current.min(self.state.read().await.protection_current);
        if !amps.is_finite() || amps.abs() > limit {
            anyhow::bail!("MockSourceMeter: current {amps} A outside range ±{limit} A");
        }
        {
            let mut state = self.state.write().await;
            state.mode = SourceMode::Current;
            state.current_setpoint = amps;
        }
        tracing::debug!(amps, "MockSourceMeter: current set");
        self.measure_current().await
    }

    async fn set_voltage(&self, volts: f64) -> Result<f64> {
        self.faults.check("set_voltage")?;
        let limit = self.max_voltage.min(self.state.read().await.protection_voltage);
        if !volts.is_finite() || volts.abs() > limit {
            anyhow::bail!("MockSourceMeter: voltage {volts} V outside range ±{limit} V");
        }
        {
            let mut state = self.state.write().await;
            state.mode = SourceMode::Voltage;
            state.voltage_setpoint = volts;
        }
        self.measure_voltage().await
    }

    async fn enable_output(&self) -> Result<()> {
        self.faults.check("enable_output")?;
        self.set_output(true).await;
        Ok(())
    }

    async fn disable_output(&self) -> Result<()> {
        self.faults.check("disable_output")?;
        self.set_output(false).await;
        Ok(())
    }

    async fn measure_current(&self) -> Result<f64> {
        self.faults.check("measure_current")?;
        Ok(self.output_current().await + self.rng.symmetric(self.noise_amps))
    }

    async fn measure_voltage(&self) -> Result<f64> {
        self.faults.check("measure_voltage")?;
        Ok(self.output_current().await * self.load_ohms)
    }

    async fn set_protection_voltage(&self, volts: f64) -> Result<f64> {
        self.faults.check("set_protection_voltage")?;
        let clamped = volts.abs().min(self.max_voltage);
        self.state.write().await.protection_voltage = clamped;
        Ok(clamped)
    }

    async fn set_protection_current(&self, amps: f64) -> Result<f64> {
        self.faults.check("set_protection_current")?;
        let clamped = amps.abs().min(self.max_current);
        self.state.write().await.protection_current = clamped;
        Ok(clamped)
    }
}

// =============================================================================
// MockLdcSensor - Simulated leakage detection board
// =============================================================================

/// Mock leakage detection board wired to a `MockSourceMeter`.
///
/// Readings are in amperes, as the real board reports them.
#[derive(Debug)]
pub struct MockLdcSensor {
    source: Arc<MockSourceMeter>,
    gain: f64,
    offset_amps: f64,
    noise_amps: f64,
    temperature_address: u16,
    ambient_celsius: f64,
    drift_per_read: f64,
    temperature_reads: AtomicUsize,
    rng: MockRng,
    faults: FaultInjector,
}

impl MockLdcSensor {
    /// Ideal board: unity gain, no offset, no noise, 25 °C without drift.
    pub fn new(source: Arc<MockSourceMeter>) -> Self {
        Self {
            source,
            gain: 1.0,
            offset_amps: 0.0,
            noise_amps: 0.0,
            temperature_address: TEMPERATURE_ADDRESS,
            ambient_celsius: 25.0,
            drift_per_read: 0.0,
            temperature_reads: AtomicUsize::new(0),
            rng: MockRng::new(None),
            faults: FaultInjector::none(),
        }
    }

    /// Apply a gain error and a fixed offset (amperes) to leakage readings.
    pub fn with_error(mut self, gain: f64, offset_amps: f64) -> Self {
        self.gain = gain;
        self.offset_amps = offset_amps;
        self
    }

    /// Add uniform noise of ±`amps` to leakage readings.
    pub fn with_noise(mut self, amps: f64, seed: Option<u64>) -> Self {
        self.noise_amps = amps;
        self.rng = MockRng::new(seed);
        self
    }

    /// Make the temperature channel drift by `celsius_per_read` on every read.
    pub fn with_temperature_drift(mut self, ambient_celsius: f64, celsius_per_read: f64) -> Self {
        self.ambient_celsius = ambient_celsius;
        self.drift_per_read = celsius_per_read;
        self
    }

    /// Install a fault scenario.
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Number of calls made to `operation` (failed calls included).
    pub fn calls(&self, operation: &str) -> usize {
        self.faults.calls(operation)
    }
}

#[async_trait]
impl LeakageSensor for MockLdcSensor {
    async fn read(&self, address: u16) -> Result<f64> {
        self.faults.check("read")?;
        if address == self.temperature_address {
            let n = self.temperature_reads.fetch_add(1, Ordering::SeqCst);
            return Ok(self.ambient_celsius + n as f64 * self.drift_per_read);
        }
        let current = self.source.output_current().await;
        Ok(self.gain * current + self.offset_amps + self.rng.symmetric(self.noise_amps))
    }

    async fn reset_interlocks(&self) -> Result<()> {
        self.faults.check("reset_interlocks")?;
        tracing::debug!("MockLdcSensor: interlocks reset");
        Ok(())
    }
}

/// Source and sensor wired together, ready to hand to the engine.
pub fn simulated_bench(
    source: MockSourceMeter,
    configure_sensor: impl FnOnce(MockLdcSensor) -> MockLdcSensor,
) -> (Arc<MockSourceMeter>, Arc<MockLdcSensor>) {
    let source = Arc::new(source);
    let sensor = Arc::new(configure_sensor(MockLdcSensor::new(Arc::clone(&source))));
    (source, sensor)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn output_current_is_zero_while_disabled() {
        let source = MockSourceMeter::new();
        source.set_current(0.003).await.unwrap();
        assert_eq!(source.measure_current().await.unwrap(), 0.0);

        source.enable_output().await.unwrap();
        assert_eq!(source.measure_current().await.unwrap(), 0.003);
        assert!(source.is_output_enabled().await);
    }

    #[tokio::test]
    async fn rejects_current_outside_compliance() {
        let source = MockSourceMeter::new().with_max_current(0.01);
        assert!(source.set_current(0.02).await.is_err());
        assert!(source.set_current(-0.02).await.is_err());
        assert!(source.set_current(0.01).await.is_ok());
        assert_eq!(source.calls("set_current"), 3);
    }

    #[tokio::test]
    async fn protection_current_narrows_range() {
        let source = MockSourceMeter::new();
        assert_eq!(source.set_protection_current(0.005).await.unwrap(), 0.005);
        assert!(source.set_current(0.006).await.is_err());
        assert!(source.set_current(0.004).await.is_ok());
    }

    #[tokio::test]
    async fn voltage_mode_drives_load() {
        let source = MockSourceMeter::new();
        source.enable_output().await.unwrap();
        assert_eq!(source.set_voltage(1.0).await.unwrap(), 1.0);
        assert!((source.measure_current().await.unwrap() - 0.1).abs() < 1e-12);
    }

    #[tokio::test]
    async fn output_transitions_ignore_repeated_commands() {
        let source = MockSourceMeter::new();
        source.enable_output().await.unwrap();
        source.enable_output().await.unwrap();
        source.disable_output().await.unwrap();
        assert_eq!(source.output_transitions(), 2);
        assert_eq!(source.calls("enable_output"), 2);
    }

    #[tokio::test]
    async fn sensor_follows_source_with_error_model() {
        let (source, sensor) = simulated_bench(MockSourceMeter::new(), |s| {
            s.with_error(1.02, 1e-5)
        });
        source.enable_output().await.unwrap();
        source.set_current(0.002).await.unwrap();
        let reading = sensor.read(LEAKAGE_ADDRESS).await.unwrap();
        assert!((reading - (0.002 * 1.02 + 1e-5)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn temperature_channel_drifts() {
        let (_source, sensor) = simulated_bench(MockSourceMeter::new(), |s| {
            s.with_temperature_drift(30.0, 0.5)
        });
        assert_eq!(sensor.read(TEMPERATURE_ADDRESS).await.unwrap(), 30.0);
        assert_eq!(sensor.read(TEMPERATURE_ADDRESS).await.unwrap(), 30.5);
    }

    #[tokio::test]
    async fn injected_fault_fails_the_call() {
        let source = MockSourceMeter::new().with_fault(Fault::OnCall {
            operation: "measure_current",
            call: 2,
        });
        assert!(source.measure_current().await.is_ok());
        let err = source.measure_current().await.unwrap_err();
        assert!(err.to_string().contains("measure_current"));
    }
}
