//! In-memory tabular data
//!
//! A `Table` is a header plus string cells, the shape every dataset takes
//! between parsing an upload and writing its canonical CSV. Sub-views load
//! canonical files back into a `Table` for their own presentation needs.

use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Writer};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse CSV text whose first record is the header.
    ///
    /// Rows shorter than the header are padded with empty cells; a row with
    /// more fields than the header is a structural error.
    pub fn parse_csv(text: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = rdr
            .headers()
            .context("Failed to read header row")?
            .iter()
            .map(|h| h.to_string())
            .collect();

        // A blank first line parses as one empty header field
        let columns = if columns.len() == 1 && columns[0].is_empty() {
            Vec::new()
        } else {
            columns
        };

        let mut rows = Vec::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("Malformed record {}", idx + 1))?;
            if record.len() > columns.len() {
                bail!(
                    "Record {} has {} fields but the header has {}",
                    idx + 1,
                    record.len(),
                    columns.len()
                );
            }
            let mut row: Vec<String> = record.iter().map(|v| v.to_string()).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Load a canonical CSV file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open dataset {}", path.display()))?;
        Self::parse_csv(&text)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn head(&self, n: usize) -> &[Vec<String>] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Parsed numbers of one column, skipping blank or non-numeric cells.
    pub fn numeric_values(&self, idx: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.get(idx).and_then(|v| parse_number(v)))
            .collect()
    }

    /// A column is numeric when it has at least one value and every non-blank
    /// cell parses as a number.
    pub fn is_numeric(&self, idx: usize) -> bool {
        let mut seen = false;
        for row in &self.rows {
            let Some(cell) = row.get(idx) else { continue };
            if cell.trim().is_empty() {
                continue;
            }
            if parse_number(cell).is_none() {
                return false;
            }
            seen = true;
        }
        seen
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        (0..self.columns.len())
            .filter(|idx| self.is_numeric(*idx))
            .map(|idx| self.columns[idx].clone())
            .collect()
    }

    /// Rows where both columns hold numbers.
    pub fn numeric_pairs(&self, x: usize, y: usize) -> Vec<(f64, f64)> {
        self.rows
            .iter()
            .filter_map(|row| {
                let a = row.get(x).and_then(|v| parse_number(v))?;
                let b = row.get(y).and_then(|v| parse_number(v))?;
                Some((a, b))
            })
            .collect()
    }
}

pub fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_pads_short_rows() {
        let table = Table::parse_csv("a,b,c\n1,2\n3,4,5\n").unwrap();
        assert_eq!(table.columns, vec!["a", "b", "c"]);
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_parse_rejects_long_rows() {
        assert!(Table::parse_csv("a,b\n1,2,3\n").is_err());
    }

    #[test]
    fn test_blank_input_has_no_columns() {
        let table = Table::parse_csv("").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 0);
    }

    #[test]
    fn test_numeric_detection() {
        let table = Table::parse_csv("id,name,score\n1,ann,3.5\n2,bob,\n3,cy,x\n").unwrap();
        assert!(table.is_numeric(0));
        assert!(!table.is_numeric(1));
        assert!(!table.is_numeric(2));
        assert_eq!(table.numeric_columns(), vec!["id"]);
        assert_eq!(table.numeric_values(2), vec![3.5]);
    }

    #[test]
    fn test_write_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");
        let table = Table::parse_csv("name,note\n\"Smith, J\",\"says \"\"hi\"\"\"\n").unwrap();
        table.write_csv(&path).unwrap();
        let loaded = Table::load(&path).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.rows[0][0], "Smith, J");
    }
}
