//! Workbook decoding: first sheet into a [`RawGrid`].

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

use super::header::RawGrid;
use crate::error::ParseFailure;
use crate::models::CellValue;

/// Decode the first sheet of an in-memory workbook.
///
/// Blank rows are dropped. Leading blank columns of the sheet are kept as
/// empty cells so that positions line up with the sheet's column letters.
/// A workbook without sheets yields an empty grid.
pub fn read_first_sheet(bytes: &[u8]) -> Result<RawGrid, ParseFailure> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseFailure::Workbook(e.to_string()))?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ParseFailure::Workbook(format!("sheet '{sheet_name}': {e}")))?;

    let left_pad = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    let grid = range
        .rows()
        .map(|row| {
            let mut cells = vec![CellValue::empty(); left_pad];
            cells.extend(row.iter().map(cell_value));
            cells
        })
        .filter(|cells| cells.iter().any(|c| !c.is_blank()))
        .collect();

    Ok(grid)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::empty(),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => float_value(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        // Serial date number, as spreadsheet tools report it without date typing.
        Data::DateTime(dt) => float_value(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

fn float_value(f: f64) -> CellValue {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        CellValue::Int(f as i64)
    } else {
        CellValue::Float(f)
    }
}
