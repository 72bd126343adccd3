//! Dataset profile: shape, column kinds, descriptive statistics and a head
//! preview. Shown as the dashboard overview and embedded in agent prompts.

use std::fmt::Write as _;

use crate::table::Table;

const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub non_empty: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DescriptiveStat {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DatasetProfile {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnProfile>,
    pub descriptive_stats: Vec<DescriptiveStat>,
    pub preview: Vec<Vec<String>>,
}

impl DatasetProfile {
    pub fn build(name: &str, table: &Table) -> Self {
        let columns = table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, col)| ColumnProfile {
                name: col.clone(),
                kind: if table.is_numeric(idx) {
                    ColumnKind::Numeric
                } else {
                    ColumnKind::Text
                },
                non_empty: table
                    .rows
                    .iter()
                    .filter(|row| row.get(idx).map_or(false, |v| !v.trim().is_empty()))
                    .count(),
            })
            .collect::<Vec<_>>();

        let descriptive_stats = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ColumnKind::Numeric)
            .filter_map(|(idx, c)| describe(&c.name, table.numeric_values(idx)))
            .collect();

        Self {
            name: name.to_string(),
            row_count: table.row_count(),
            column_count: table.column_count(),
            columns,
            descriptive_stats,
            preview: table.head(PREVIEW_ROWS).to_vec(),
        }
    }

    /// Plain-text rendering used as LLM context.
    pub fn to_prompt(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Dataset \"{}\": {} rows x {} columns.",
            self.name, self.row_count, self.column_count
        );
        let _ = writeln!(out, "Columns:");
        for col in &self.columns {
            let kind = match col.kind {
                ColumnKind::Numeric => "numeric",
                ColumnKind::Text => "text",
            };
            let _ = writeln!(out, "- {} ({}, {} non-empty)", col.name, kind, col.non_empty);
        }
        if !self.descriptive_stats.is_empty() {
            let _ = writeln!(out, "Numeric summary:");
            for s in &self.descriptive_stats {
                let _ = writeln!(
                    out,
                    "- {}: count={} mean={:.4} std={:.4} min={} median={} max={}",
                    s.column, s.count, s.mean, s.std_dev, s.min, s.median, s.max
                );
            }
        }
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let _ = writeln!(out, "First {} rows:", self.preview.len());
        let _ = writeln!(out, "{}", names.join(","));
        for row in &self.preview {
            let _ = writeln!(out, "{}", row.join(","));
        }
        out
    }
}

pub fn describe(column: &str, mut values: Vec<f64>) -> Option<DescriptiveStat> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };
    Some(DescriptiveStat {
        column: column.to_string(),
        count,
        mean,
        std_dev: std_dev(&values, mean),
        min: values[0],
        median,
        max: values[count - 1],
    })
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    variance.sqrt()
}

/// Pearson correlation over the common prefix of both slices.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = x.iter().take(n).sum::<f64>() / n as f64;
    let mean_y = y.iter().take(n).sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut denom_x = 0.0;
    let mut denom_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        num += dx * dy;
        denom_x += dx * dx;
        denom_y += dy * dy;
    }
    if denom_x == 0.0 || denom_y == 0.0 {
        0.0
    } else {
        num / (denom_x.sqrt() * denom_y.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_sales() {
        let table = Table::parse_csv("id,amount,region\n1,10.5,north\n2,20.0,south\n").unwrap();
        let profile = DatasetProfile::build("sales.csv", &table);

        assert_eq!(profile.row_count, 2);
        assert_eq!(profile.columns[2].kind, ColumnKind::Text);
        assert_eq!(profile.descriptive_stats.len(), 2);

        let amount = &profile.descriptive_stats[1];
        assert_eq!(amount.column, "amount");
        assert!((amount.mean - 15.25).abs() < 1e-9);
        assert!((amount.median - 15.25).abs() < 1e-9);
        assert_eq!(amount.max, 20.0);

        let prompt = profile.to_prompt();
        assert!(prompt.contains("\"sales.csv\": 2 rows x 3 columns"));
        assert!(prompt.contains("- region (text, 2 non-empty)"));
        assert!(prompt.contains("id,amount,region"));
    }

    #[test]
    fn test_correlation() {
        assert!((correlation(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-9);
        assert!((correlation(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-9);
        assert_eq!(correlation(&[1.0, 1.0], &[2.0, 3.0]), 0.0);
        assert_eq!(correlation(&[1.0], &[2.0]), 0.0);
    }
}
