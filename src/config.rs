//! Bench Configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/ldc_bench.toml` (or the file given with `--config`)
//! 3. Environment variables prefixed with `LDC_BENCH_`, nested keys separated by `__`
//!
//! # Example
//! ```no_run
//! use ldc_bench::config::BenchConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // LDC_BENCH_SWEEP__RUN_COUNT=3 overrides sweep.run_count
//! let config = BenchConfig::load()?;
//! config.validate()?;
//! println!("Sweeping {} points", config.sweep.total_steps());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::acquisition::{ChannelSettings, SampleClock, DEFAULT_FREQUENCY_HZ};
use crate::error::{BenchError, BenchResult};
use crate::logging::{parse_log_level, OutputFormat};
use crate::storage::{TestInfo, DEFAULT_LAB};
use crate::sweep::SweepConfig;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/ldc_bench.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "LDC_BENCH_";

/// Top-level bench configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Sampling settings
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Sweep, runs and device addresses
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Artifact output settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default)]
    pub log_format: OutputFormat,
    /// Log span open and close events (`run`, `sweep_step`)
    #[serde(default)]
    pub log_span_events: bool,
    /// Include source file and line in log lines
    #[serde(default)]
    pub log_file_and_line: bool,
    /// ANSI colors in pretty output
    #[serde(default = "default_true")]
    pub log_ansi: bool,
    /// Lab identifier written to INFO.txt
    #[serde(default = "default_lab")]
    pub lab: String,
}

/// Acquisition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Sampling frequency in Hz
    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,
    /// Board variable read as auxiliary channel (temperature), if any
    #[serde(default)]
    pub aux_address: Option<u16>,
    /// Factor converting sensor readings to mA
    #[serde(default = "default_scale")]
    pub sensor_scale_to_milliamps: f64,
    /// Factor converting instrument current readings to mA
    #[serde(default = "default_scale")]
    pub reference_scale_to_milliamps: f64,
    /// Settle delay after every current command, in milliseconds
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of all artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Test name written to INFO.txt and used for measurement directories
    #[serde(default = "default_test_name")]
    pub test_name: String,
}

// Default value functions
fn default_name() -> String {
    "LDC Bench".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_lab() -> String {
    DEFAULT_LAB.to_string()
}

fn default_frequency() -> f64 {
    DEFAULT_FREQUENCY_HZ
}

fn default_scale() -> f64 {
    1000.0
}

fn default_settle_delay() -> u64 {
    150
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_test_name() -> String {
    "LDC Accuracy Test".to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
            log_span_events: false,
            log_file_and_line: false,
            log_ansi: default_true(),
            lab: default_lab(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            frequency_hz: default_frequency(),
            aux_address: None,
            sensor_scale_to_milliamps: default_scale(),
            reference_scale_to_milliamps: default_scale(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            test_name: default_test_name(),
        }
    }
}

impl AcquisitionConfig {
    /// Sampling clock at the configured frequency.
    pub fn clock(&self) -> BenchResult<SampleClock> {
        SampleClock::new(self.frequency_hz)
    }

    /// Unit scaling and auxiliary channel of the sampler.
    pub fn channels(&self) -> ChannelSettings {
        ChannelSettings {
            sensor_scale_to_milliamps: self.sensor_scale_to_milliamps,
            reference_scale_to_milliamps: self.reference_scale_to_milliamps,
            aux_address: self.aux_address,
        }
    }

    /// Settle delay as a `Duration`.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl BenchConfig {
    /// Load configuration from `config/ldc_bench.toml` and environment variables
    ///
    /// Example: LDC_BENCH_APPLICATION__LOG_LEVEL=debug
    pub fn load() -> BenchResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file leaves the defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> BenchResult<Self> {
        Ok(Self::figment(path).extract()?)
    }

    /// Provider stack used by [`BenchConfig::load_from`].
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(BenchConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> BenchResult<()> {
        parse_log_level(&self.application.log_level).map_err(BenchError::InvalidConfig)?;

        self.acquisition.clock()?;
        for (name, scale) in [
            ("sensor_scale_to_milliamps", self.acquisition.sensor_scale_to_milliamps),
            ("reference_scale_to_milliamps", self.acquisition.reference_scale_to_milliamps),
        ] {
            if !scale.is_finite() || scale == 0.0 {
                return Err(BenchError::InvalidConfig(format!(
                    "Invalid {name} {scale}. Must be finite and non-zero"
                )));
            }
        }

        self.sweep.validate()?;

        let test_name = self.storage.test_name.trim();
        if test_name.is_empty() {
            return Err(BenchError::InvalidConfig(
                "storage.test_name must not be empty".to_string(),
            ));
        }
        if test_name.contains(['/', '\\']) {
            return Err(BenchError::InvalidConfig(format!(
                "storage.test_name '{test_name}' must not contain path separators"
            )));
        }

        Ok(())
    }

    /// Test identification for `INFO.txt`.
    pub fn test_info(&self) -> TestInfo {
        TestInfo {
            test_name: self.storage.test_name.clone(),
            lab: self.application.lab.clone(),
        }
    }

    /// Effective configuration rendered as TOML.
    pub fn to_toml(&self) -> BenchResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BenchError::InvalidConfig(format!("Cannot render configuration: {e}")))
    }
}
