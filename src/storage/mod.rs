//! Artifact output: run directory layout, per-point and summary artifacts, and the rendering sink
//! behind them.

pub mod artifacts;
pub mod plot;
pub mod sink;
pub mod table;

pub use artifacts::{ArtifactWriter, RunContext, TestInfo, DEFAULT_LAB};
pub use sink::{ArtifactSink, Column, LabeledSeries, SvgCsvSink};
pub use table::{read_table, write_table, Table};
