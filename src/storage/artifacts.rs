//! Artifact layout and naming.
//!
//! ```text
//! <root>/
//! ├── INFO.txt
//! └── <address>/
//!     └── <run_index>/
//!         ├── Plots/
//!         │   ├── 002 1.000mA Leakage Current-18_10_2026-14_03_27.svg
//!         │   ├── SourceCurrent_X_MeanLeakageCurrent.svg
//!         │   ├── SourceCurrent_X_MeanCurrentError.svg
//!         │   └── SourceCurrent_X_CurrentStandardDeviation.svg
//!         └── Samples/
//!             ├── 002 1.000mA Leakage Current-18_10_2026-14_03_27.csv
//!             ├── SourceCurrent_X_MeanLeakageCurrent.csv
//!             ├── SourceCurrent_X_MeanCurrentError.csv
//!             ├── SourceCurrent_X_CurrentStandardDeviation.csv
//!             └── sweep_summary.json
//! ```
//!
//! Per-point names embed the step number, the commanded current and the window timestamp; summary names are
//! fixed, so rewriting a summary overwrites it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BenchError, BenchResult};
use crate::storage::{ArtifactSink, Column, LabeledSeries, SvgCsvSink};
use crate::sweep::{SweepPoint, SweepSeries};

/// Image subdirectory of a run.
pub const PLOTS_DIR: &str = "Plots";
/// Table subdirectory of a run.
pub const SAMPLES_DIR: &str = "Samples";
/// Invocation description file at the output root.
pub const INFO_FILE: &str = "INFO.txt";
/// Full per-point statistics of a sweep.
pub const SUMMARY_JSON: &str = "sweep_summary.json";

/// Summary artifact: source current against mean leakage current.
pub const MEAN_LEAKAGE_SUMMARY: &str = "SourceCurrent_X_MeanLeakageCurrent";
/// Summary artifact: source current against mean current error.
pub const MEAN_ERROR_SUMMARY: &str = "SourceCurrent_X_MeanCurrentError";
/// Summary artifact: source current against the standard deviation.
pub const STD_DEV_SUMMARY: &str = "SourceCurrent_X_CurrentStandardDeviation";

/// Lab identifier written to `INFO.txt` unless configured otherwise.
pub const DEFAULT_LAB: &str = "SEI - Electronics Systems and Instrumentation";

/// Timestamp suffix of per-point artifacts and measurement directories.
pub const FILE_TIMESTAMP_FORMAT: &str = "%d_%m_%Y-%H_%M_%S";
const INFO_TIMESTAMP_FORMAT: &str = "%d/%m/%Y - %H:%M";

const TIME_COLUMN: &str = "Time [s]";
const LEAKAGE_COLUMN: &str = "Leakage Current [mA]";
const TEMPERATURE_COLUMN: &str = "Temperature [°C]";
const SOURCE_COLUMN: &str = "Source Current [mA]";

/// Identification of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInfo {
    /// Operator-supplied test name.
    pub test_name: String,
    /// Lab identifier.
    pub lab: String,
}

impl TestInfo {
    /// Test info with the default lab identifier.
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            lab: DEFAULT_LAB.to_string(),
        }
    }
}

/// Where the artifacts of one (address, run) pair go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    /// Board address being swept.
    pub device_address: u16,
    /// 1-based run number.
    pub run_index: u32,
    /// Run directory.
    pub output_path: PathBuf,
}

impl RunContext {
    /// Image directory of the run.
    pub fn plots_dir(&self) -> PathBuf {
        self.output_path.join(PLOTS_DIR)
    }

    /// Table directory of the run.
    pub fn samples_dir(&self) -> PathBuf {
        self.output_path.join(SAMPLES_DIR)
    }
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    test_name: &'a str,
    device_address: u16,
    run_index: u32,
    series: &'a SweepSeries,
}

/// Names and writes every artifact below one output root.
pub struct ArtifactWriter {
    root: PathBuf,
    info: TestInfo,
    sink: Arc<dyn ArtifactSink>,
}

impl ArtifactWriter {
    /// Writer rendering SVG plots and CSV tables below `root`.
    pub fn new(root: impl Into<PathBuf>, info: TestInfo) -> Self {
        Self {
            root: root.into(),
            info,
            sink: Arc::new(SvgCsvSink),
        }
    }

    /// Replace the rendering sink.
    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Invocation details written to `INFO.txt`.
    pub fn info(&self) -> &TestInfo {
        &self.info
    }

    /// Directory of the run `run_index` on `address`.
    pub fn run_path(&self, address: u16, run_index: u32) -> PathBuf {
        self.root.join(address.to_string()).join(run_index.to_string())
    }

    /// Create the directories of a run.
    ///
    /// # Errors
    /// `DirectoryExists` when the run directory is already present.
    pub fn prepare_run(&self, address: u16, run_index: u32) -> BenchResult<RunContext> {
        let context = RunContext {
            device_address: address,
            run_index,
            output_path: self.run_path(address, run_index),
        };
        self.create_layout(&context)?;
        Ok(context)
    }

    /// Create the directory of a single measurement, `<root>/<test name>-<timestamp>`.
    pub fn prepare_measurement(
        &self,
        address: u16,
        started: DateTime<Local>,
    ) -> BenchResult<RunContext> {
        let name = format!(
            "{}-{}",
            self.info.test_name,
            started.format(FILE_TIMESTAMP_FORMAT)
        );
        let context = RunContext {
            device_address: address,
            run_index: 1,
            output_path: self.root.join(name),
        };
        self.create_layout(&context)?;
        Ok(context)
    }

    fn create_layout(&self, context: &RunContext) -> BenchResult<()> {
        if let Some(parent) = context.output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Fails on an existing run directory, whoever created it.
        fs::create_dir(&context.output_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                BenchError::DirectoryExists(context.output_path.clone())
            }
            _ => BenchError::from(e),
        })?;
        fs::create_dir_all(context.plots_dir())?;
        fs::create_dir_all(context.samples_dir())?;
        debug!(path = %context.output_path.display(), "Run directory created");
        Ok(())
    }

    /// Write `INFO.txt` at the output root: test name, date and lab identifier.
    pub fn write_info(&self, date: DateTime<Local>) -> BenchResult<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(INFO_FILE);
        let contents = format!(
            "{}\n{}\n{}",
            self.info.test_name,
            date.format(INFO_TIMESTAMP_FORMAT),
            self.info.lab
        );
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// File stem of a point's artifacts: 1-based step, commanded current and window start.
    pub fn point_stem(point: &SweepPoint) -> String {
        format!(
            "{:03} {:.3}mA Leakage Current-{}",
            point.step_index + 1,
            point.commanded_milliamps(),
            point.timestamp.format(FILE_TIMESTAMP_FORMAT)
        )
    }

    /// Plot and table of one point's samples. Returns the written paths.
    pub fn write_point(&self, context: &RunContext, point: &SweepPoint) -> BenchResult<Vec<PathBuf>> {
        let title = format!("{:.3}mA Leakage Current", point.commanded_milliamps());
        let series = LabeledSeries::new(
            title,
            Column::new(TIME_COLUMN, point.window.elapsed()),
            Column::new(LEAKAGE_COLUMN, point.window.sensor_values()),
        )
        .with_secondary(
            point
                .window
                .aux_values()
                .map(|values| Column::new(TEMPERATURE_COLUMN, values)),
        );

        let paths = self.emit(context, &Self::point_stem(point), &series)?;
        debug!(step = point.step_index + 1, plot = %paths[0].display(), "Point artifacts written");
        Ok(paths)
    }

    /// The three summary plots and tables plus `sweep_summary.json`.
    ///
    /// # Errors
    /// `IncompleteSeries` unless the series holds every planned point.
    pub fn write_summary(
        &self,
        context: &RunContext,
        series: &SweepSeries,
    ) -> BenchResult<Vec<PathBuf>> {
        if !series.is_complete() {
            return Err(BenchError::IncompleteSeries {
                expected: series.total_steps(),
                actual: series.len(),
            });
        }

        let source = Column::new(SOURCE_COLUMN, series.currents_ma());
        let summaries = [
            LabeledSeries::new(
                "Source Current X Mean Leakage Current",
                source.clone(),
                Column::new("Mean Leakage Current [mA]", series.means()),
            )
            .with_markers(),
            LabeledSeries::new(
                "Source Current X Mean Current Error",
                source.clone(),
                Column::new("Mean Current Error [mA]", series.mean_errors()),
            ),
            LabeledSeries::new(
                "Source Current X Current Standard Deviation",
                source,
                Column::new("Current Standard Deviation [mA]", series.std_devs()),
            ),
        ];

        let mut written = Vec::with_capacity(7);
        for (stem, summary) in [MEAN_LEAKAGE_SUMMARY, MEAN_ERROR_SUMMARY, STD_DEV_SUMMARY]
            .into_iter()
            .zip(summaries.iter())
        {
            written.extend(self.emit(context, stem, summary)?);
        }

        let json_path = context.samples_dir().join(SUMMARY_JSON);
        let document = SummaryDocument {
            test_name: &self.info.test_name,
            device_address: context.device_address,
            run_index: context.run_index,
            series,
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| BenchError::Io(std::io::Error::other(e)))?;
        fs::write(&json_path, json)?;
        written.push(json_path);

        info!(
            address = context.device_address,
            run_index = context.run_index,
            points = series.len(),
            "Sweep summary written"
        );
        Ok(written)
    }

    fn emit(&self, context: &RunContext, stem: &str, series: &LabeledSeries) -> BenchResult<Vec<PathBuf>> {
        let plot_path = context
            .plots_dir()
            .join(format!("{stem}.{}", self.sink.plot_extension()));
        let table_path = context.samples_dir().join(format!("{stem}.csv"));
        self.sink.emit(series, &plot_path, &table_path)?;
        Ok(vec![plot_path, table_path])
    }
}
