//! Tabular file parsing with header detection and column sanitization.
//!
//! Turns an uploaded file of unknown shape into a [`NormalizedTable`].
//! The path is chosen by file extension (case-insensitive): `.xlsx`, `.xls`
//! and `.xlsm` go through the workbook reader, everything else is treated as
//! delimited text.
//!
//! - [`header`] - densest-row header detection
//! - [`sanitize`] - unique, identifier-safe column ids
//! - [`encoding`] - text decoding and delimiter detection
//! - [`spreadsheet`] - first-sheet workbook decoding

pub mod encoding;
pub mod header;
pub mod sanitize;
pub mod spreadsheet;

use std::path::Path;

use crate::config::{PREVIEW_ROWS, SPREADSHEET_EXTENSIONS};
use crate::error::{ParseError, ParseFailure};
use crate::models::{CellValue, NormalizedTable};

pub use encoding::{decode_text, detect_delimiter, detect_encoding};
pub use header::{resolve_header_row, RawGrid};
pub use sanitize::{sanitize_column_names, sanitize_columns};

/// An in-memory file: a name (used for dispatch) and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_filename(&self.name)
    }
}

/// Parse path selected for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    DelimitedText,
    Spreadsheet,
}

impl FileKind {
    /// Dispatch on extension; unknown extensions are delimited text.
    pub fn from_filename(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
            FileKind::Spreadsheet
        } else {
            FileKind::DelimitedText
        }
    }
}

/// Parse a file with the process-wide preview cap.
pub fn parse_file(file: &UploadedFile) -> Result<NormalizedTable, ParseError> {
    parse_file_with_limit(file, PREVIEW_ROWS)
}

/// Parse a file keeping at most `limit` rows.
///
/// An empty source is an empty table, not an error. Unreadable content fails
/// with a [`ParseError`] naming the file; no partial table is returned.
pub fn parse_file_with_limit(file: &UploadedFile, limit: usize) -> Result<NormalizedTable, ParseError> {
    let kind = file.kind();
    let result = match kind {
        FileKind::Spreadsheet => parse_spreadsheet(&file.bytes, limit),
        FileKind::DelimitedText => parse_delimited(&file.bytes, limit),
    };

    match result {
        Ok(table) => {
            tracing::debug!(
                file = %file.name,
                ?kind,
                columns = table.columns.len(),
                rows = table.rows.len(),
                total_rows = table.total_rows,
                "parsed file"
            );
            Ok(table)
        }
        Err(cause) => {
            tracing::warn!(file = %file.name, error = %cause, "failed to parse file");
            Err(ParseError::new(&file.name, cause))
        }
    }
}

/// Workbook path: first sheet, densest row as header, following rows as data.
pub fn parse_spreadsheet(bytes: &[u8], limit: usize) -> Result<NormalizedTable, ParseFailure> {
    let grid = spreadsheet::read_first_sheet(bytes)?;
    Ok(table_from_grid(grid, limit))
}

/// Build a table from a raw grid using header detection.
pub fn table_from_grid(grid: RawGrid, limit: usize) -> NormalizedTable {
    let Some(header_idx) = resolve_header_row(&grid) else {
        return NormalizedTable::empty();
    };

    let mut rows = grid.into_iter().skip(header_idx);
    let header: Vec<String> = rows
        .next()
        .unwrap_or_default()
        .iter()
        .map(ToString::to_string)
        .collect();

    NormalizedTable::from_records(sanitize_columns(&header), rows, limit)
}

/// Delimited-text path: header in the first record, blank lines skipped.
pub fn parse_delimited(bytes: &[u8], limit: usize) -> Result<NormalizedTable, ParseFailure> {
    let text = decode_text(bytes)?;
    let delimiter = detect_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let fields: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(CellValue::from).collect::<Vec<_>>());
    }

    let header = if !fields.is_empty() {
        fields
    } else if let Some(first) = records.first() {
        // No field names reported: fall back to the first record's positions.
        vec![String::new(); first.len()]
    } else {
        return Ok(NormalizedTable::empty());
    };

    Ok(NormalizedTable::from_records(sanitize_columns(&header), records, limit))
}
