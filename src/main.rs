//! CLI Entry Point for ldc-bench
//!
//! Provides command-line interface for:
//! - Running a full accuracy test (sweeps over runs and device addresses)
//! - Single-point leakage measurements
//! - Re-rendering a plot from a samples table
//! - Printing the effective configuration
//!
//! Commands drive the simulated bench; the engine only sees the capability traits.
//!
//! # Usage
//!
//! ```bash
//! ldc-bench sweep --maximum 0.004 --duration 1 --runs 3 --addresses 53,54 --output data/run1
//! ldc-bench read 0.002 --duration 5 --degauss
//! ldc-bench replot "data/run1/53/1/Samples/001 0.000mA Leakage Current-18_10_2026-14_03_27.csv"
//! ldc-bench config
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use ldc_bench::acquisition::LeakageSampler;
use ldc_bench::config::{BenchConfig, DEFAULT_CONFIG_PATH};
use ldc_bench::hardware::{simulated_bench, MockLdcSensor, MockSourceMeter, LEAKAGE_ADDRESS};
use ldc_bench::logging;
use ldc_bench::storage::{plot, read_table, ArtifactWriter, LabeledSeries};
use ldc_bench::sweep::{Direction, RunOrchestrator, SweepController};

#[derive(Parser)]
#[command(name = "ldc-bench")]
#[command(about = "Accuracy test bench for leakage-current detection boards", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Missing files fall back to the defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the accuracy test: one sweep per run and device address
    Sweep {
        #[command(flatten)]
        sweep: SweepArgs,

        #[command(flatten)]
        bench: SimulatedBenchArgs,

        /// Output root directory
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Test name written to INFO.txt
        #[arg(long)]
        test_name: Option<String>,
    },

    /// Measure a single point at a fixed current
    Read {
        /// Commanded current in amperes
        current: f64,

        /// Board address of the leakage reading
        #[arg(long, default_value_t = LEAKAGE_ADDRESS)]
        address: u16,

        /// Acquisition window in seconds
        #[arg(long, default_value_t = 10.0)]
        duration: f64,

        /// Degauss the sensor before measuring
        #[arg(long)]
        degauss: bool,

        #[command(flatten)]
        bench: SimulatedBenchArgs,

        /// Output root directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Render a plot from an existing samples table
    Replot {
        /// CSV table written by a sweep or a read
        input: PathBuf,

        /// Plot path (defaults to the input path with an .svg extension)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Plot caption (defaults to the input file stem)
        #[arg(long)]
        title: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Command-line overrides of the sweep configuration.
#[derive(Args)]
struct SweepArgs {
    /// Current increment in amperes
    #[arg(long)]
    step: Option<f64>,

    /// Lowest current in amperes
    #[arg(long)]
    minimum: Option<f64>,

    /// Highest current in amperes
    #[arg(long)]
    maximum: Option<f64>,

    /// Acquisition window per point in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Sweep direction (ascending, descending)
    #[arg(long)]
    direction: Option<Direction>,

    /// Sweeps per device address
    #[arg(long = "runs")]
    run_count: Option<u32>,

    /// Device addresses, comma separated
    #[arg(long, value_delimiter = ',')]
    addresses: Option<Vec<u16>>,

    /// Degauss the sensor before every run
    #[arg(long)]
    reset: bool,

    /// Board address of the temperature channel
    #[arg(long)]
    aux_address: Option<u16>,
}

/// Behaviour of the simulated source-meter and sensor.
#[derive(Args)]
struct SimulatedBenchArgs {
    /// Sensor gain error (1.0 is ideal)
    #[arg(long, default_value_t = 1.0)]
    gain: f64,

    /// Sensor offset in amperes
    #[arg(long, default_value_t = 0.0)]
    offset: f64,

    /// Sensor noise amplitude in amperes
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// Seed for reproducible noise
    #[arg(long)]
    seed: Option<u64>,

    /// Temperature drift per temperature read in °C
    #[arg(long, default_value_t = 0.0)]
    drift: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = BenchConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.application.log_level = level;
    }

    match cli.command {
        Commands::Sweep {
            sweep,
            bench,
            output,
            test_name,
        } => {
            apply_sweep_overrides(&mut config, sweep);
            if let Some(output) = output {
                config.storage.output_dir = output;
            }
            if let Some(test_name) = test_name {
                config.storage.test_name = test_name;
            }
            init_logging(&config)?;
            run_sweep(&config, &bench).await
        }
        Commands::Read {
            current,
            address,
            duration,
            degauss,
            bench,
            output,
        } => {
            if let Some(output) = output {
                config.storage.output_dir = output;
            }
            init_logging(&config)?;
            run_read(&config, &bench, address, current, duration, degauss).await
        }
        Commands::Replot {
            input,
            output,
            title,
        } => {
            init_logging(&config)?;
            replot(input, output, title)
        }
        Commands::Config => {
            config.validate().context("Invalid configuration")?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn init_logging(config: &BenchConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    logging::init_from_config(config).map_err(anyhow::Error::msg)
}

fn apply_sweep_overrides(config: &mut BenchConfig, args: SweepArgs) {
    let sweep = &mut config.sweep;
    if let Some(step) = args.step {
        sweep.step = step;
    }
    if let Some(minimum) = args.minimum {
        sweep.minimum = minimum;
    }
    if let Some(maximum) = args.maximum {
        sweep.maximum = maximum;
    }
    if let Some(duration) = args.duration {
        sweep.duration = duration;
    }
    if let Some(direction) = args.direction {
        sweep.direction = direction;
    }
    if let Some(run_count) = args.run_count {
        sweep.run_count = run_count;
    }
    if let Some(addresses) = args.addresses {
        sweep.device_addresses = addresses;
    }
    if args.reset {
        sweep.apply_reset = true;
    }
    if args.aux_address.is_some() {
        config.acquisition.aux_address = args.aux_address;
    }
}

/// Wire the simulated bench to a fresh orchestrator.
fn build_orchestrator(config: &BenchConfig, bench: &SimulatedBenchArgs) -> Result<RunOrchestrator> {
    let (source, sensor) = simulated_bench(MockSourceMeter::new(), |sensor: MockLdcSensor| {
        sensor
            .with_error(bench.gain, bench.offset)
            .with_noise(bench.noise, bench.seed)
            .with_temperature_drift(25.0, bench.drift)
    });

    let sampler = LeakageSampler::new(
        config.acquisition.clock()?,
        source.clone(),
        sensor.clone(),
        config.acquisition.channels(),
    );
    let controller = SweepController::new(source.clone(), sampler)
        .with_settle_delay(config.acquisition.settle_delay());
    let writer = ArtifactWriter::new(&config.storage.output_dir, config.test_info());

    Ok(RunOrchestrator::new(source, sensor, controller, writer))
}

async fn run_sweep(config: &BenchConfig, bench: &SimulatedBenchArgs) -> Result<()> {
    let orchestrator = build_orchestrator(config, bench)?;
    let sweep = &config.sweep;
    let points = sweep.total_steps();
    let estimate = Duration::from_secs_f64(
        points as f64
            * (sweep.duration + config.acquisition.settle_delay().as_secs_f64())
            * (sweep.run_count as usize * sweep.device_addresses.len()) as f64,
    );
    info!(
        output = %config.storage.output_dir.display(),
        points,
        estimate_s = estimate.as_secs(),
        "Running accuracy test on the simulated bench"
    );

    let report = orchestrator.execute(sweep).await.context("Batch failed to start")?;

    for run in &report.completed {
        println!(
            "address {} run {}: {} points, {} artifacts in {}",
            run.context.device_address,
            run.context.run_index,
            run.series.len(),
            run.artifacts.len(),
            run.context.output_path.display()
        );
    }
    for failure in &report.failures {
        println!("FAILED {failure}");
    }
    println!(
        "{} of {} runs completed",
        report.completed.len(),
        report.attempts
    );

    if !report.is_success() {
        bail!("{} run(s) failed", report.failures.len());
    }
    Ok(())
}

async fn run_read(
    config: &BenchConfig,
    bench: &SimulatedBenchArgs,
    address: u16,
    current: f64,
    duration: f64,
    degauss: bool,
) -> Result<()> {
    let orchestrator = build_orchestrator(config, bench)?;
    let measurement = orchestrator
        .single_measurement(address, current, duration, degauss)
        .await
        .with_context(|| format!("Measurement at {current} A failed"))?;

    let stats = &measurement.point.statistics;
    println!(
        "{:.3} mA: mean {:.6} mA, error {:.6} mA, std dev {:.6} mA over {} samples",
        measurement.point.commanded_milliamps(),
        stats.mean,
        stats.mean_error,
        stats.std_dev,
        stats.count
    );
    for path in &measurement.artifacts {
        println!("{}", path.display());
    }
    Ok(())
}

fn replot(input: PathBuf, output: Option<PathBuf>, title: Option<String>) -> Result<()> {
    let table = read_table(&input)
        .with_context(|| format!("Failed to read samples table {}", input.display()))?;

    let (Some(x), Some(y)) = (table.column_at(0), table.column_at(1)) else {
        bail!("{} needs at least two columns", input.display());
    };
    if table.columns().len() > 3 {
        warn!(columns = table.columns().len(), "Only the first three columns are plotted");
    }

    let title = title.unwrap_or_else(|| {
        input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let series = LabeledSeries::new(title, x.clone(), y.clone())
        .with_secondary(table.column_at(2).cloned());

    let output = output.unwrap_or_else(|| input.with_extension("svg"));
    plot::render_svg(&output, &series)
        .with_context(|| format!("Failed to render {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}
