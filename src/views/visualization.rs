//! Statistical plots for the Visualization view, rendered to PNG.

use std::path::Path;

use anyhow::{bail, Result};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::profile::correlation;
use crate::table::Table;
use crate::types::{AppError, AppResult};

const DEFAULT_BINS: usize = 20;
pub const MAX_BINS: usize = 200;
const MAX_HEATMAP_COLUMNS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    Histogram,
    Scatter,
    BoxPlot,
    CorrelationHeatmap,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlotRequest {
    pub plot: PlotKind,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub bins: Option<usize>,
}

/// What the view offers for the selected dataset.
#[derive(Debug, Clone, Serialize)]
pub struct VisualizationOptions {
    pub dataset: String,
    pub numeric_columns: Vec<String>,
    pub plots: Vec<PlotKind>,
}

impl VisualizationOptions {
    pub fn for_table(dataset: &str, table: &Table) -> Self {
        let numeric_columns = table.numeric_columns();
        let mut plots = Vec::new();
        if !numeric_columns.is_empty() {
            plots.extend([PlotKind::Histogram, PlotKind::Scatter, PlotKind::BoxPlot]);
        }
        if numeric_columns.len() >= 2 {
            plots.push(PlotKind::CorrelationHeatmap);
        }
        Self {
            dataset: dataset.to_string(),
            numeric_columns,
            plots,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

fn numeric_column(table: &Table, name: Option<&String>, axis: &str) -> AppResult<usize> {
    let name = name.ok_or_else(|| AppError::InvalidRequest(format!("{} column is required", axis)))?;
    let idx = table
        .column_index(name)
        .ok_or_else(|| AppError::InvalidRequest(format!("unknown column {}", name)))?;
    if !table.is_numeric(idx) {
        return Err(AppError::InvalidRequest(format!("column {} is not numeric", name)));
    }
    Ok(idx)
}

fn bin_count(requested: Option<usize>) -> AppResult<usize> {
    match requested {
        None => Ok(DEFAULT_BINS),
        Some(bins) if (1..=MAX_BINS).contains(&bins) => Ok(bins),
        Some(bins) => Err(AppError::InvalidRequest(format!(
            "bins must be between 1 and {}, got {}",
            MAX_BINS, bins
        ))),
    }
}

/// Equal-width bins over [min, max]; the last bin includes max. At most
/// `MAX_BINS` bins are produced.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let bins = bins.min(MAX_BINS);
    let (min, max) = bounds(values);
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: min + width * i as f64,
            end: min + width * (i + 1) as f64,
            count,
        })
        .collect()
}

/// Quartiles by linear interpolation between closest ranks.
pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    if values.is_empty() {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let quantile = |q: f64| {
        let pos = q * (v.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        v[lo] + (v[hi] - v[lo]) * (pos - lo as f64)
    };
    Some(BoxStats {
        min: v[0],
        q1: quantile(0.25),
        median: quantile(0.5),
        q3: quantile(0.75),
        max: v[v.len() - 1],
    })
}

/// Pairwise Pearson correlation over rows where both columns are numeric.
pub fn correlation_matrix(table: &Table, columns: &[usize]) -> Vec<Vec<f64>> {
    columns
        .iter()
        .map(|&a| {
            columns
                .iter()
                .map(|&b| {
                    let (x, y): (Vec<f64>, Vec<f64>) = table.numeric_pairs(a, b).into_iter().unzip();
                    correlation(&x, &y)
                })
                .collect()
        })
        .collect()
}

/// Min and max, widened when all values are equal so axes stay drawable.
fn bounds(values: &[f64]) -> (f64, f64) {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    }
}

/// Render the requested plot of `table` to `output_path`.
pub fn render_plot(table: &Table, request: &PlotRequest, output_path: &Path) -> AppResult<()> {
    let drawn = match request.plot {
        PlotKind::Histogram => {
            let x = numeric_column(table, request.x.as_ref(), "x")?;
            let bins = histogram_bins(&table.numeric_values(x), bin_count(request.bins)?);
            write_histogram(output_path, &table.columns[x], &bins)
        }
        PlotKind::Scatter => {
            let x = numeric_column(table, request.x.as_ref(), "x")?;
            let y = numeric_column(table, request.y.as_ref(), "y")?;
            let points = table.numeric_pairs(x, y);
            if points.is_empty() {
                return Err(AppError::InvalidRequest(
                    "no rows where both columns are numeric".to_string(),
                ));
            }
            write_scatter(output_path, &table.columns[x], &table.columns[y], &points)
        }
        PlotKind::BoxPlot => {
            let x = numeric_column(table, request.x.as_ref(), "x")?;
            let stats = box_stats(&table.numeric_values(x))
                .ok_or_else(|| AppError::InvalidRequest("column has no values".to_string()))?;
            write_boxplot(output_path, &table.columns[x], &stats)
        }
        PlotKind::CorrelationHeatmap => {
            let columns: Vec<usize> = (0..table.column_count())
                .filter(|idx| table.is_numeric(*idx))
                .take(MAX_HEATMAP_COLUMNS)
                .collect();
            if columns.len() < 2 {
                return Err(AppError::InvalidRequest(
                    "a correlation heatmap needs at least two numeric columns".to_string(),
                ));
            }
            let labels: Vec<String> = columns.iter().map(|idx| table.columns[*idx].clone()).collect();
            write_heatmap(output_path, &correlation_matrix(table, &columns), &labels)
        }
    };
    drawn.map_err(|e| AppError::Internal(format!("Failed to render plot: {:#}", e)))
}

fn write_histogram(output_path: &Path, column: &str, bins: &[HistogramBin]) -> Result<()> {
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        bail!("no values to bin");
    };
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64;

    let root = BitMapBackend::new(output_path, (900, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(format!("Histogram of {}", column), ("sans-serif", 24))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(first.start..last.end, 0f64..max_count * 1.1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(column)
        .y_desc("count")
        .draw()?;

    chart.draw_series(bins.iter().map(|b| {
        Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], BLUE.mix(0.6).filled())
    }))?;

    root.present()?;
    Ok(())
}

fn write_scatter(output_path: &Path, x_name: &str, y_name: &str, points: &[(f64, f64)]) -> Result<()> {
    if points.is_empty() {
        bail!("no points to draw");
    }
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let (x_min, x_max) = bounds(&xs);
    let (y_min, y_max) = bounds(&ys);

    let root = BitMapBackend::new(output_path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(format!("Scatter Plot: {} vs {}", x_name, y_name), ("sans-serif", 24))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart.configure_mesh().x_desc(x_name).y_desc(y_name).draw()?;
    chart.draw_series(points.iter().map(|(x, y)| Circle::new((*x, *y), 3, BLUE.filled())))?;

    root.present()?;
    Ok(())
}

fn write_boxplot(output_path: &Path, column: &str, stats: &BoxStats) -> Result<()> {
    let (y_min, y_max) = bounds(&[stats.min, stats.max]);

    let root = BitMapBackend::new(output_path, (600, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(format!("Box Plot of {}", column), ("sans-serif", 24))
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..1f64, y_min..y_max)?;

    chart.configure_mesh().disable_x_mesh().disable_x_axis().y_desc(column).draw()?;

    chart.draw_series(std::iter::once(Rectangle::new(
        [(0.3, stats.q1), (0.7, stats.q3)],
        BLUE.mix(0.3).filled(),
    )))?;
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.3, stats.median), (0.7, stats.median)],
        &BLUE,
    )))?;
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.5, stats.q3), (0.5, stats.max)],
        &BLACK,
    )))?;
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.5, stats.q1), (0.5, stats.min)],
        &BLACK,
    )))?;

    root.present()?;
    Ok(())
}

fn write_heatmap(output_path: &Path, matrix: &[Vec<f64>], labels: &[String]) -> Result<()> {
    let size = matrix.len();
    if size == 0 {
        bail!("empty correlation matrix");
    }

    let root = BitMapBackend::new(output_path, (800, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption("Correlation Heatmap", ("sans-serif", 24))
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0..size, 0..size)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(size)
        .y_labels(size)
        .x_label_formatter(&|x| labels.get(*x).cloned().unwrap_or_default())
        .y_label_formatter(&|y| labels.get(*y).cloned().unwrap_or_default())
        .draw()?;

    for (i, row) in matrix.iter().enumerate() {
        for (j, val) in row.iter().enumerate() {
            // -1 blue, 0 green, +1 red
            let color = HSLColor(240.0 / 360.0 - (240.0 / 360.0) * ((val + 1.0) / 2.0), 0.7, 0.5);
            chart.draw_series(std::iter::once(Rectangle::new(
                [(i, j), (i + 1, j + 1)],
                color.filled(),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}
