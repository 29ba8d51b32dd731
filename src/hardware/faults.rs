//! Fault injection for simulated devices.
//!
//! Every mock operation passes through `FaultInjector::check`, which counts the call and
//! decides whether it should fail. Counting doubles as call tracking for tests ("output was
//! disabled exactly once").

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded RNG wrapper for reproducible behavior.
pub struct MockRng {
    inner: Mutex<ChaCha8Rng>,
}

impl MockRng {
    /// Create a new RNG with optional seed.
    /// If seed is None, uses a random seed from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            inner: Mutex::new(rng),
        }
    }

    /// Uniform value in `[-amplitude, amplitude]`; zero when the amplitude is not positive.
    pub fn symmetric(&self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 || !amplitude.is_finite() {
            return 0.0;
        }
        let mut rng = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(-amplitude..=amplitude)
    }

    /// True with probability `rate` (clamped to 0..=1).
    pub fn should_fail(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let mut rng = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen::<f64>() < rate
    }
}

impl Default for MockRng {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for MockRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRng")
            .field("inner", &"<Mutex<ChaCha8Rng>>")
            .finish()
    }
}

/// A failure scenario for one operation.
///
/// Call numbers are 1-based and count every call of that operation on the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fault {
    /// Fail only the `call`-th call of `operation`.
    OnCall {
        /// Operation name, e.g. `"set_current"`.
        operation: &'static str,
        /// 1-based call number that fails.
        call: usize,
    },
    /// Fail every call of `operation` from the `call`-th on (communication loss).
    FromCall {
        /// Operation name.
        operation: &'static str,
        /// 1-based first failing call.
        call: usize,
    },
    /// Fail calls of `operation` at random with probability `rate`.
    Random {
        /// Operation name.
        operation: &'static str,
        /// Failure probability from 0.0 to 1.0.
        rate: f64,
    },
}

impl Fault {
    fn operation(&self) -> &'static str {
        match self {
            Fault::OnCall { operation, .. }
            | Fault::FromCall { operation, .. }
            | Fault::Random { operation, .. } => operation,
        }
    }
}

/// Per-device fault plan plus call counters.
#[derive(Debug, Default)]
pub struct FaultInjector {
    faults: Vec<Fault>,
    calls: Mutex<HashMap<&'static str, usize>>,
    rng: MockRng,
}

impl FaultInjector {
    /// Injector that never fails (still counts calls).
    pub fn none() -> Self {
        Self::default()
    }

    /// Injector running the given scenarios.
    pub fn with_faults(faults: Vec<Fault>, seed: Option<u64>) -> Self {
        Self {
            faults,
            calls: Mutex::new(HashMap::new()),
            rng: MockRng::new(seed),
        }
    }

    /// Add a scenario.
    pub fn push(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    /// Count a call of `operation` and fail it if a scenario says so.
    pub fn check(&self, operation: &'static str) -> Result<()> {
        let call = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            let count = calls.entry(operation).or_insert(0);
            *count += 1;
            *count
        };

        for fault in self.faults.iter().filter(|f| f.operation() == operation) {
            let fails = match *fault {
                Fault::OnCall { call: n, .. } => call == n,
                Fault::FromCall { call: n, .. } => call >= n,
                Fault::Random { rate, .. } => self.rng.should_fail(rate),
            };
            if fails {
                anyhow::bail!("simulated communication failure on {operation} (call #{call})");
            }
        }
        Ok(())
    }

    /// How many times `operation` was called, failed calls included.
    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(operation)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_rng_is_deterministic() {
        let a = MockRng::new(Some(42));
        let b = MockRng::new(Some(42));
        for _ in 0..10 {
            assert_eq!(a.symmetric(1.0), b.symmetric(1.0));
        }
    }

    #[test]
    fn symmetric_stays_in_bounds() {
        let rng = MockRng::new(Some(7));
        for _ in 0..1000 {
            let v = rng.symmetric(0.5);
            assert!((-0.5..=0.5).contains(&v));
        }
        assert_eq!(rng.symmetric(0.0), 0.0);
    }

    #[test]
    fn on_call_fails_exactly_once() {
        let injector = FaultInjector::with_faults(
            vec![Fault::OnCall {
                operation: "set_current",
                call: 3,
            }],
            Some(1),
        );
        assert!(injector.check("set_current").is_ok());
        assert!(injector.check("set_current").is_ok());
        assert!(injector.check("set_current").is_err());
        assert!(injector.check("set_current").is_ok());
        assert!(injector.check("read").is_ok());
        assert_eq!(injector.calls("set_current"), 4);
        assert_eq!(injector.calls("read"), 1);
        assert_eq!(injector.calls("disable_output"), 0);
    }

    #[test]
    fn from_call_keeps_failing() {
        let injector = FaultInjector::with_faults(
            vec![Fault::FromCall {
                operation: "read",
                call: 2,
            }],
            None,
        );
        assert!(injector.check("read").is_ok());
        assert!(injector.check("read").is_err());
        assert!(injector.check("read").is_err());
    }

    #[test]
    fn random_rate_extremes() {
        let injector = FaultInjector::with_faults(
            vec![
                Fault::Random {
                    operation: "always",
                    rate: 1.0,
                },
                Fault::Random {
                    operation: "never",
                    rate: 0.0,
                },
            ],
            Some(3),
        );
        for _ in 0..20 {
            assert!(injector.check("always").is_err());
            assert!(injector.check("never").is_ok());
        }
    }
}
