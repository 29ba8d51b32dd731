//! Artifact sink: one labeled series in, one image plus one table out.

use std::path::Path;

use crate::error::{BenchError, BenchResult};
use crate::storage::{plot, table};

/// Named column of values. The name doubles as table header and axis description.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Header, e.g. `"Time [s]"`.
    pub name: String,
    /// Values in row order.
    pub values: Vec<f64>,
}

impl Column {
    /// Create a column.
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the column holds no value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// X/Y series with an optional secondary Y axis, ready to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSeries {
    /// Plot caption.
    pub title: String,
    /// Horizontal axis.
    pub x: Column,
    /// Primary vertical axis.
    pub y: Column,
    /// Secondary vertical axis, drawn against the right edge.
    pub secondary: Option<Column>,
    /// Draw a marker on every point.
    pub markers: bool,
}

impl LabeledSeries {
    /// Series of `y` against `x`.
    pub fn new(title: impl Into<String>, x: Column, y: Column) -> Self {
        Self {
            title: title.into(),
            x,
            y,
            secondary: None,
            markers: false,
        }
    }

    /// Add a secondary axis.
    pub fn with_secondary(mut self, secondary: Option<Column>) -> Self {
        self.secondary = secondary;
        self
    }

    /// Mark every point.
    pub fn with_markers(mut self) -> Self {
        self.markers = true;
        self
    }

    /// Columns in table order: x, y, then the secondary axis.
    pub fn columns(&self) -> Vec<&Column> {
        let mut columns = vec![&self.x, &self.y];
        columns.extend(self.secondary.as_ref());
        columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// True when the series has no row.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Fail unless every column has as many values as `x`.
    pub fn check(&self) -> BenchResult<()> {
        let expected = self.x.len();
        for column in self.columns() {
            if column.len() != expected {
                return Err(BenchError::ColumnLength {
                    column: column.name.clone(),
                    expected,
                    actual: column.len(),
                });
            }
        }
        Ok(())
    }
}

/// Destination for rendered series.
pub trait ArtifactSink: Send + Sync {
    /// File extension of the images this sink renders.
    fn plot_extension(&self) -> &'static str {
        "svg"
    }

    /// Render `series` as an image at `plot_path` and a delimited table at `table_path`.
    ///
    /// Parent directories must exist; unwritable paths are errors.
    fn emit(&self, series: &LabeledSeries, plot_path: &Path, table_path: &Path) -> BenchResult<()>;
}

/// SVG plots and comma-separated tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgCsvSink;

impl ArtifactSink for SvgCsvSink {
    fn emit(&self, series: &LabeledSeries, plot_path: &Path, table_path: &Path) -> BenchResult<()> {
        series.check()?;
        table::write_table(table_path, &series.columns())?;
        plot::render_svg(plot_path, series)
    }
}
