//! File Normalizer
//!
//! Turns an uploaded CSV or spreadsheet into a canonical UTF-8 CSV file inside
//! the session workspace. Every failure is reported as an `AppError` for that
//! file; nothing in here panics on malformed input.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Range, Reader};
use chrono::NaiveTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::data_registry::DatasetRegistry;
use crate::models::{CanonicalDataset, UploadedFile};
use crate::table::Table;
use crate::types::{AppError, AppResult, FileRejection};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// Format from the file extension, falling back to the declared (or guessed)
/// MIME type when the name has no extension.
pub fn detect_format(name: &str, content_type: Option<&str>) -> FileFormat {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension {
        Some(ext) if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) => FileFormat::Spreadsheet,
        Some(_) => FileFormat::Csv,
        None => {
            let mime = content_type
                .map(|m| m.to_string())
                .or_else(|| mime_guess::from_path(name).first().map(|m| m.to_string()))
                .unwrap_or_default();
            if mime.contains("spreadsheet") || mime.contains("ms-excel") {
                FileFormat::Spreadsheet
            } else {
                FileFormat::Csv
            }
        }
    }
}

/// Decode as UTF-8, retrying once as Latin-1 for legacy single-byte exports.
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (
            text.strip_prefix('\u{feff}').unwrap_or(text).to_string(),
            TextEncoding::Utf8,
        ),
        Err(_) => (
            bytes.iter().map(|&b| b as char).collect(),
            TextEncoding::Latin1,
        ),
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_datetime_to_string(dt),
        Data::Error(e) => e.to_string(),
    }
}

/// ISO 8601: a plain date at midnight, otherwise date and time. Durations use
/// the `PT..S` form.
fn excel_datetime_to_string(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        return dt
            .as_duration()
            .map(|d| d.to_string())
            .unwrap_or_else(|| dt.as_f64().to_string());
    }
    match dt.as_datetime() {
        Some(value) if value.time() == NaiveTime::MIN => value.format("%Y-%m-%d").to_string(),
        Some(value) => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => dt.as_f64().to_string(),
    }
}

/// First row is the header; blank header cells get positional names and
/// fully blank rows are dropped.
pub fn range_to_table(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let name = cell_to_string(cell);
                if name.trim().is_empty() {
                    format!("column_{}", idx + 1)
                } else {
                    name
                }
            })
            .collect(),
        None => Vec::new(),
    };

    let rows = rows
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Table { columns, rows }
}

pub fn read_spreadsheet(file_name: &str, bytes: &[u8]) -> AppResult<Table> {
    let corrupt = |reason: String| AppError::CorruptFile {
        file: file_name.to_string(),
        reason,
    };

    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| corrupt(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| corrupt("workbook has no worksheets".to_string()))?
        .map_err(|e| corrupt(e.to_string()))?;

    Ok(range_to_table(&range))
}

pub fn read_csv(file_name: &str, bytes: &[u8]) -> AppResult<Table> {
    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    if sniff.contains(&0) {
        return Err(AppError::CorruptFile {
            file: file_name.to_string(),
            reason: "binary content is not CSV text".to_string(),
        });
    }

    let (text, encoding) = decode_text(bytes);
    if encoding == TextEncoding::Latin1 {
        warn!(file = %file_name, "File is not valid UTF-8, decoded as Latin-1");
    }

    Table::parse_csv(&text).map_err(|e| AppError::CorruptFile {
        file: file_name.to_string(),
        reason: format!("{:#}", e),
    })
}

/// Outcome of one upload batch: registered datasets and per-file failures.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub accepted: Vec<CanonicalDataset>,
    pub rejected: Vec<FileRejection>,
    /// Canonical files of datasets overwritten by this batch (already deleted)
    pub replaced: Vec<PathBuf>,
}

pub struct FileNormalizer {
    workspace: PathBuf,
    max_upload_bytes: usize,
}

impl FileNormalizer {
    pub fn new(workspace: impl Into<PathBuf>, max_upload_bytes: usize) -> Self {
        Self {
            workspace: workspace.into(),
            max_upload_bytes,
        }
    }

    /// Parse and validate one upload, then write its canonical CSV.
    pub fn normalize(&self, file: &UploadedFile) -> AppResult<CanonicalDataset> {
        if file.data.len() > self.max_upload_bytes {
            return Err(AppError::CorruptFile {
                file: file.name.clone(),
                reason: format!(
                    "file too large ({} bytes, limit {})",
                    file.data.len(),
                    self.max_upload_bytes
                ),
            });
        }

        let format = detect_format(&file.name, file.content_type.as_deref());
        let table = match format {
            FileFormat::Spreadsheet => read_spreadsheet(&file.name, &file.data)?,
            FileFormat::Csv => read_csv(&file.name, &file.data)?,
        };

        if table.is_empty() {
            return Err(AppError::EmptyDataset(file.name.clone()));
        }

        std::fs::create_dir_all(&self.workspace)?;
        let source_path = self.workspace.join(format!("{}.csv", Uuid::new_v4()));
        table
            .write_csv(&source_path)
            .map_err(|e| AppError::Internal(format!("{:#}", e)))?;

        debug!(
            file = %file.name,
            format = ?format,
            path = %source_path.display(),
            "Wrote canonical CSV"
        );

        Ok(CanonicalDataset {
            display_name: file.name.clone(),
            source_path,
            row_count: table.row_count(),
            column_count: table.column_count(),
            columns: table.columns,
        })
    }

    /// Normalize and register a batch. Bad files are skipped; the batch fails
    /// with `NoValidFiles` only when nothing was accepted.
    pub fn ingest_batch(
        &self,
        files: &[UploadedFile],
        registry: &mut DatasetRegistry,
    ) -> AppResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        for file in files {
            let previous = registry.get(&file.name).map(|d| d.source_path.clone());
            let result = self.normalize(file).and_then(|dataset| {
                let path = dataset.source_path.clone();
                match registry.register(&file.name, dataset) {
                    Ok(name) => {
                        // Overwritten in place: the old canonical file is dead
                        if let Some(old) = previous.filter(|old| name == file.name && *old != path) {
                            let _ = std::fs::remove_file(&old);
                            debug!(dataset = %name, path = %old.display(), "Removed replaced canonical file");
                            outcome.accepted.retain(|d| d.source_path != old);
                            outcome.replaced.push(old);
                        }
                        registry
                            .get(&name)
                            .cloned()
                            .ok_or_else(|| AppError::Internal(format!("{} vanished after registration", name)))
                    }
                    Err(e) => {
                        let _ = std::fs::remove_file(&path);
                        Err(e)
                    }
                }
            });

            match result {
                Ok(dataset) => {
                    info!(
                        dataset = %dataset.display_name,
                        rows = dataset.row_count,
                        columns = dataset.column_count,
                        "Dataset registered"
                    );
                    outcome.accepted.push(dataset);
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "Upload rejected");
                    outcome.rejected.push(e.rejection(&file.name));
                }
            }
        }

        if outcome.accepted.is_empty() {
            return Err(AppError::NoValidFiles(outcome.rejected));
        }
        Ok(outcome)
    }
}
