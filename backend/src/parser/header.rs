//! Header row detection.
//!
//! Spreadsheet exports often carry title rows or blank rows above the real
//! header. The header is taken to be the densest row: the one with the most
//! non-blank cells, earliest row winning ties.

use crate::models::CellValue;

/// Rows of raw cells with no column alignment guarantee.
pub type RawGrid = Vec<Vec<CellValue>>;

/// Number of cells whose trimmed string form is non-empty.
pub fn non_empty_count(row: &[CellValue]) -> usize {
    row.iter().filter(|c| !c.is_blank()).count()
}

/// Index of the most plausible header row, or `None` for an empty grid.
pub fn resolve_header_row(grid: &[Vec<CellValue>]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;

    for (idx, row) in grid.iter().enumerate() {
        let count = non_empty_count(row);
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((idx, count)),
        }
    }

    best.map(|(idx, _)| idx)
}
