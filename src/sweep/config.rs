//! Sweep configuration.
//!
//! ```toml
//! [sweep]
//! step = 0.001        # A
//! minimum = 0.0       # A
//! maximum = 0.01      # A
//! duration = 10.0     # s per point
//! direction = "ascending"
//! run_count = 1
//! device_addresses = [53]
//! apply_reset = false
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

/// Largest number of points one sweep may plan.
pub const MAX_SWEEP_POINTS: usize = 100_000;

/// Order in which sweep points are visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From `minimum` up to `maximum`.
    #[default]
    Ascending,
    /// From `maximum` down to `minimum`.
    Descending,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ascending => write!(f, "ascending"),
            Direction::Descending => write!(f, "descending"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascending" | "asc" | "up" => Ok(Direction::Ascending),
            "descending" | "desc" | "down" => Ok(Direction::Descending),
            other => Err(format!(
                "Invalid direction '{other}'. Must be one of: ascending, descending"
            )),
        }
    }
}

/// Parameters of one current sweep, repeated over runs and device addresses.
///
/// Currents are in amperes, `duration` in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Increment between consecutive points.
    #[serde(default = "default_step")]
    pub step: f64,

    /// Lowest commanded current.
    #[serde(default)]
    pub minimum: f64,

    /// Highest commanded current.
    #[serde(default = "default_maximum")]
    pub maximum: f64,

    /// Acquisition window length per point.
    #[serde(default = "default_duration")]
    pub duration: f64,

    /// Visiting order of the points.
    #[serde(default)]
    pub direction: Direction,

    /// Number of sweeps per device address.
    #[serde(default = "default_run_count")]
    pub run_count: u32,

    /// Board addresses to sweep, in order.
    #[serde(default = "default_device_addresses")]
    pub device_addresses: Vec<u16>,

    /// Degauss the board before every run.
    #[serde(default)]
    pub apply_reset: bool,
}

fn default_step() -> f64 {
    0.001
}
fn default_maximum() -> f64 {
    0.01
}
fn default_duration() -> f64 {
    10.0
}
fn default_run_count() -> u32 {
    1
}
fn default_device_addresses() -> Vec<u16> {
    vec![53]
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            minimum: 0.0,
            maximum: default_maximum(),
            duration: default_duration(),
            direction: Direction::default(),
            run_count: default_run_count(),
            device_addresses: default_device_addresses(),
            apply_reset: false,
        }
    }
}

impl SweepConfig {
    /// Check the sweep invariants.
    pub fn validate(&self) -> BenchResult<()> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(BenchError::InvalidConfig(format!(
                "Sweep step must be positive, got {} A",
                self.step
            )));
        }
        if !self.minimum.is_finite() || !self.maximum.is_finite() {
            return Err(BenchError::InvalidConfig(
                "Sweep bounds must be finite".to_string(),
            ));
        }
        if self.minimum > self.maximum {
            return Err(BenchError::InvalidConfig(format!(
                "Sweep minimum {} A exceeds maximum {} A",
                self.minimum, self.maximum
            )));
        }
        let intervals = (self.span() / self.step).round_ties_even();
        if !intervals.is_finite() || intervals >= MAX_SWEEP_POINTS as f64 {
            return Err(BenchError::InvalidConfig(format!(
                "Sweep of {} A in steps of {} A exceeds {MAX_SWEEP_POINTS} points",
                self.span(),
                self.step
            )));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(BenchError::InvalidConfig(format!(
                "Acquisition duration must be positive, got {} s",
                self.duration
            )));
        }
        if self.run_count == 0 {
            return Err(BenchError::InvalidConfig(
                "run_count must be at least 1".to_string(),
            ));
        }
        if self.device_addresses.is_empty() {
            return Err(BenchError::InvalidConfig(
                "At least one device address is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for address in &self.device_addresses {
            if !seen.insert(address) {
                return Err(BenchError::InvalidConfig(format!(
                    "Duplicate device address: {address}"
                )));
            }
        }

        Ok(())
    }

    /// `maximum - minimum`.
    pub fn span(&self) -> f64 {
        self.maximum - self.minimum
    }

    /// Number of points in one sweep: `round(span / step) + 1`, ties rounding to even.
    ///
    /// Saturates for sweeps that `validate` rejects.
    pub fn total_steps(&self) -> usize {
        let intervals = (self.span() / self.step).round_ties_even();
        if intervals.is_finite() && intervals > 0.0 {
            (intervals as usize).checked_add(1).unwrap_or(usize::MAX)
        } else {
            1
        }
    }

    /// Commanded current of the point at `index` (0-based).
    ///
    /// The last point sits exactly on the far boundary of the sweep.
    pub fn current_at(&self, index: usize) -> f64 {
        let last = self.total_steps().saturating_sub(1);
        match self.direction {
            Direction::Ascending if index >= last && last > 0 => self.maximum,
            Direction::Descending if index >= last && last > 0 => self.minimum,
            Direction::Ascending => self.minimum + index as f64 * self.step,
            Direction::Descending => self.maximum - index as f64 * self.step,
        }
    }

    /// Every commanded current of one sweep, in visiting order.
    pub fn currents(&self) -> Vec<f64> {
        (0..self.total_steps()).map(|i| self.current_at(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(step: f64, minimum: f64, maximum: f64) -> SweepConfig {
        SweepConfig {
            step,
            minimum,
            maximum,
            duration: 1.0,
            ..SweepConfig::default()
        }
    }

    #[test]
    fn defaults_are_valid() {
        let config = SweepConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.total_steps(), 11);
        assert_eq!(config.device_addresses, vec![53]);
    }

    #[test]
    fn total_steps_rounds_the_ratio() {
        assert_eq!(sweep(0.001, 0.0, 0.004).total_steps(), 5);
        assert_eq!(sweep(0.001, 0.0, 0.0).total_steps(), 1);
        assert_eq!(sweep(0.003, 0.0, 0.01).total_steps(), 4);
        // half-way ratios round to even
        assert_eq!(sweep(0.5, 0.0, 0.25).total_steps(), 1);
        assert_eq!(sweep(0.5, 0.0, 0.75).total_steps(), 3);
        assert_eq!(sweep(0.5, 0.0, 1.25).total_steps(), 3);
    }

    #[test]
    fn ascending_currents_end_on_maximum() {
        let config = sweep(0.001, 0.0, 0.004);
        let currents = config.currents();
        let expected = [0.0, 0.001, 0.002, 0.003, 0.004];
        for (c, e) in currents.iter().zip(expected) {
            assert!((c - e).abs() < 1e-12);
        }
        assert_eq!(*currents.last().unwrap(), 0.004);
    }

    #[test]
    fn descending_currents_end_on_minimum() {
        let config = SweepConfig {
            direction: Direction::Descending,
            ..sweep(0.001, 0.0, 0.004)
        };
        let currents = config.currents();
        assert_eq!(currents.len(), 5);
        assert_eq!(currents[0], 0.004);
        assert_eq!(*currents.last().unwrap(), 0.0);
        assert!((currents[2] - 0.002).abs() < 1e-12);
    }

    #[test]
    fn uneven_span_snaps_last_point() {
        let config = sweep(0.003, 0.0, 0.01);
        assert_eq!(config.currents().last().copied(), Some(0.01));
    }

    #[test]
    fn oversized_sweeps_are_rejected() {
        let config = sweep(1e-20, 0.0, 1.0);
        assert!(matches!(config.validate(), Err(BenchError::InvalidConfig(_))));
        assert_eq!(config.total_steps(), usize::MAX);
        assert_eq!(config.current_at(0), 0.0);

        assert!(sweep(1e-9, 0.0, 0.01).validate().is_err());
        assert!(sweep(1e-7, 0.0, 0.01).validate().is_ok());
        assert!(sweep(f64::MIN_POSITIVE, 0.0, f64::MAX).validate().is_err());
    }

    #[test]
    fn validate_rejects_broken_sweeps() {
        assert!(sweep(0.0, 0.0, 0.01).validate().is_err());
        assert!(sweep(-0.001, 0.0, 0.01).validate().is_err());
        assert!(sweep(0.001, 0.02, 0.01).validate().is_err());
        assert!(SweepConfig {
            duration: 0.0,
            ..SweepConfig::default()
        }
        .validate()
        .is_err());
        assert!(SweepConfig {
            run_count: 0,
            ..SweepConfig::default()
        }
        .validate()
        .is_err());
        assert!(SweepConfig {
            device_addresses: vec![],
            ..SweepConfig::default()
        }
        .validate()
        .is_err());

        let err = SweepConfig {
            device_addresses: vec![53, 54, 53],
            ..SweepConfig::default()
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate device address: 53"));
    }

    #[test]
    fn direction_parses_and_serializes_lowercase() {
        assert_eq!("Descending".parse::<Direction>(), Ok(Direction::Descending));
        assert_eq!("up".parse::<Direction>(), Ok(Direction::Ascending));
        assert!("sideways".parse::<Direction>().is_err());

        let toml = "step = 0.002\ndirection = \"descending\"\n";
        let config: SweepConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.direction, Direction::Descending);
        assert_eq!(config.step, 0.002);
        assert_eq!(config.maximum, 0.01);
        assert_eq!(config.run_count, 1);
    }
}
