//! SVG rendering of labeled series.

use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::{BenchError, BenchResult};
use crate::storage::{Column, LabeledSeries};

/// Image size in pixels.
pub const PLOT_SIZE: (u32, u32) = (1000, 500);

const PRIMARY_COLOR: RGBColor = RGBColor(31, 119, 180);
const SECONDARY_COLOR: RGBColor = RGBColor(214, 39, 40);

/// Render `series` to an SVG file at `path`.
pub fn render_svg(path: &Path, series: &LabeledSeries) -> BenchResult<()> {
    series.check()?;

    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    match &series.secondary {
        Some(secondary) => draw_dual_axis(&root, series, secondary)?,
        None => draw_single_axis(&root, series)?,
    }

    root.present().map_err(plot_err)?;
    Ok(())
}

fn draw_single_axis(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    series: &LabeledSeries,
) -> BenchResult<()> {
    let mut chart = ChartBuilder::on(root)
        .caption(series.title.as_str(), ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(padded_range(&series.x), padded_range(&series.y))
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc(series.x.name.as_str())
        .y_desc(series.y.name.as_str())
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(points(&series.x, &series.y), &PRIMARY_COLOR))
        .map_err(plot_err)?;

    if series.markers {
        chart
            .draw_series(
                points(&series.x, &series.y).map(|p| Circle::new(p, 3, PRIMARY_COLOR.filled())),
            )
            .map_err(plot_err)?;
    }

    Ok(())
}

fn draw_dual_axis(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    series: &LabeledSeries,
    secondary: &Column,
) -> BenchResult<()> {
    let x_range = padded_range(&series.x);
    let mut chart = ChartBuilder::on(root)
        .caption(series.title.as_str(), ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .right_y_label_area_size(80)
        .build_cartesian_2d(x_range.clone(), padded_range(&series.y))
        .map_err(plot_err)?
        .set_secondary_coord(x_range, padded_range(secondary));

    chart
        .configure_mesh()
        .x_desc(series.x.name.as_str())
        .y_desc(series.y.name.as_str())
        .draw()
        .map_err(plot_err)?;

    chart
        .configure_secondary_axes()
        .y_desc(secondary.name.as_str())
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(points(&series.x, &series.y), &PRIMARY_COLOR))
        .map_err(plot_err)?
        .label(series.y.name.as_str())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], PRIMARY_COLOR.stroke_width(3)));

    chart
        .draw_secondary_series(LineSeries::new(
            points(&series.x, secondary),
            &SECONDARY_COLOR,
        ))
        .map_err(plot_err)?
        .label(secondary.name.as_str())
        .legend(|(x, y)| {
            PathElement::new(vec![(x, y), (x + 25, y)], SECONDARY_COLOR.stroke_width(3))
        });

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(plot_err)?;

    Ok(())
}

fn points<'a>(x: &'a Column, y: &'a Column) -> impl Iterator<Item = (f64, f64)> + 'a {
    x.values.iter().copied().zip(y.values.iter().copied())
}

/// Axis range covering every finite value with a 5% margin.
///
/// Degenerate inputs (no finite value, or a constant column) still get a non-empty range.
pub fn padded_range(column: &Column) -> Range<f64> {
    let (lo, hi) = column
        .values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if lo > hi {
        return 0.0..1.0;
    }
    let span = hi - lo;
    let pad = if span > 0.0 {
        span * 0.05
    } else {
        (hi.abs() * 0.05).max(1e-3)
    };
    (lo - pad)..(hi + pad)
}

fn plot_err(err: impl std::fmt::Display) -> BenchError {
    BenchError::Plot(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_range_adds_margin() {
        let r = padded_range(&Column::new("y", vec![0.0, 10.0]));
        assert!((r.start + 0.5).abs() < 1e-12);
        assert!((r.end - 10.5).abs() < 1e-12);
    }

    #[test]
    fn padded_range_handles_degenerate_columns() {
        let constant = padded_range(&Column::new("y", vec![2.0, 2.0]));
        assert!(constant.start < 2.0 && constant.end > 2.0);

        let zero = padded_range(&Column::new("y", vec![0.0]));
        assert!(zero.start < 0.0 && zero.end > 0.0);

        assert_eq!(padded_range(&Column::new("y", vec![])), 0.0..1.0);
        assert_eq!(padded_range(&Column::new("y", vec![f64::NAN])), 0.0..1.0);
    }

    #[test]
    fn secondary_axis_is_labeled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.svg");
        let series = LabeledSeries::new(
            "Temperature Drift",
            Column::new("Time [s]", vec![0.0, 1.0, 2.0]),
            Column::new("Leakage Current [mA]", vec![1.0, 1.01, 1.02]),
        )
        .with_secondary(Some(Column::new("Temperature", vec![25.0, 26.0, 27.0])));

        render_svg(&path, &series).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Temperature Drift"));
        // caption plus the secondary axis description and legend entry
        assert!(svg.matches("Temperature").count() >= 3);
    }

    #[test]
    fn rendering_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let series = LabeledSeries::new(
            "Summary",
            Column::new("Source Current [mA]", vec![0.0, 1.0, 2.0]),
            Column::new("Mean Leakage Current [mA]", vec![0.01, 1.02, 1.98]),
        )
        .with_markers();

        let a = dir.path().join("a.svg");
        let b = dir.path().join("b.svg");
        render_svg(&a, &series).unwrap();
        render_svg(&b, &series).unwrap();
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }
}
