//! Global subscriber installation.
//!
//! Lives in its own test binary: installing the global dispatcher would steal events from the
//! `#[traced_test]` tests in the library.

use ldc_bench::config::BenchConfig;
use ldc_bench::logging::{self, OutputFormat, TracingConfig};
use tracing::Level;

#[test]
fn init_is_idempotent() {
    let compact = TracingConfig::new(Level::ERROR).with_format(OutputFormat::Compact);
    assert!(logging::init(compact).is_ok());
    assert!(tracing::dispatcher::has_been_set());

    assert!(logging::init(TracingConfig::new(Level::ERROR)).is_ok());

    let mut config = BenchConfig::default();
    config.application.log_format = OutputFormat::Json;
    config.application.log_span_events = true;
    assert!(logging::init_from_config(&config).is_ok());
}

#[test]
fn init_from_config_rejects_unknown_level() {
    let mut config = BenchConfig::default();
    config.application.log_level = "loud".to_string();
    assert!(logging::init_from_config(&config).is_err());
}
