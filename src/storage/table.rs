//! Comma-separated tables with a header row.
//!
//! Values are written with Rust's shortest round-trip float formatting, so reading a table back
//! reproduces the written values exactly.

use std::path::{Path, PathBuf};

use crate::error::{BenchError, BenchResult};
use crate::storage::Column;

/// Write `columns` side by side, one row per value.
pub fn write_table(path: &Path, columns: &[&Column]) -> BenchResult<()> {
    let rows = columns.first().map_or(0, |c| c.len());
    if let Some(short) = columns.iter().find(|c| c.len() != rows) {
        return Err(BenchError::ColumnLength {
            column: short.name.clone(),
            expected: rows,
            actual: short.len(),
        });
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns.iter().map(|c| c.name.as_str()))?;
    for row in 0..rows {
        writer.write_record(columns.iter().map(|c| c.values[row].to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Columns read back from a table file.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    path: PathBuf,
    columns: Vec<Column>,
}

impl Table {
    /// File the table was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Columns in file order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column with the given header.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column at `index` (0-based).
    pub fn column_at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Number of data rows.
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }
}

/// Read a table written by [`write_table`] (or any numeric CSV with a header row).
pub fn read_table(path: &Path) -> BenchResult<Table> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut columns: Vec<Column> = reader
        .headers()?
        .iter()
        .map(|name| Column::new(name.trim(), Vec::new()))
        .collect();

    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);
        for (column, field) in columns.iter_mut().zip(record.iter()) {
            let value = field
                .trim()
                .parse::<f64>()
                .map_err(|e| BenchError::MalformedTable {
                    path: path.to_path_buf(),
                    line,
                    message: format!("column '{}': {e}", column.name),
                })?;
            column.values.push(value);
        }
    }

    Ok(Table {
        path: path.to_path_buf(),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        let time = Column::new("Time [s]", vec![0.0, 0.1, 0.2, 0.30000000000000004]);
        let current = Column::new("Leakage Current [mA]", vec![1.0001, -0.25, 1e-7, 3.5]);

        write_table(&path, &[&time, &current]).unwrap();
        let table = read_table(&path).unwrap();

        assert_eq!(table.rows(), 4);
        assert_eq!(table.column("Time [s]"), Some(&time));
        assert_eq!(table.column_at(1), Some(&current));
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        let a = Column::new("a", vec![1.0, 2.0]);
        let b = Column::new("b", vec![1.0]);
        assert!(matches!(
            write_table(&path, &[&a, &b]),
            Err(BenchError::ColumnLength { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn non_numeric_cell_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(&path, "Time,Leakage Current\n0.0,1.0\n0.1,oops\n").unwrap();

        match read_table(&path) {
            Err(BenchError::MalformedTable { line, message, .. }) => {
                assert_eq!(line, 3);
                assert!(message.contains("Leakage Current"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_table_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_table(&dir.path().join("absent.csv")),
            Err(BenchError::Table(_))
        ));
    }
}
