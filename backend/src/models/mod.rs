//! Domain models shared by the parser, the envelope decoder and the API.
//!
//! - [`CellValue`] - a single cell (text, integer or float)
//! - [`Column`] - identifier-safe id plus display label
//! - [`Row`] - ordered cells keyed by column id, with a synthetic `rowIndex`
//! - [`NormalizedTable`] - columns + preview rows, format independent
//! - [`PatternDescriptor`] - what the pattern-inference service proposes
//! - [`RegexInfo`] / [`MatchStats`] - side-channel metadata of a processed file

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::error::TableError;

// =============================================================================
// Cells
// =============================================================================

/// A raw cell value.
///
/// Empty cells are `Text("")`, which is also what padding produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn empty() -> Self {
        CellValue::Text(String::new())
    }

    /// True when the trimmed string form is empty.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Int(_) | CellValue::Float(_) => false,
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(x) => write!(f, "{x}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        CellValue::Float(x)
    }
}

// =============================================================================
// Columns
// =============================================================================

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Unique, identifier-safe id (`[A-Za-z0-9_]+`).
    pub id: String,
    /// Display text derived from the source header.
    pub label: String,
}

impl Column {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// True when `id` is non-empty and made of ASCII word characters only.
pub fn is_identifier_safe(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

// =============================================================================
// Rows
// =============================================================================

/// One table row: cells keyed by column id, in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// 1-based display position, assigned at normalization time.
    pub row_index: usize,
    cells: Cells,
}

impl Row {
    /// Build a row from `(column id, value)` pairs.
    pub fn new(row_index: usize, cells: Vec<(String, CellValue)>) -> Self {
        Self {
            row_index,
            cells: Cells(cells),
        }
    }

    /// Value for a column id.
    pub fn get(&self, id: &str) -> Option<&CellValue> {
        self.cells.0.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    /// Column ids, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.0.iter().map(|(k, _)| k.as_str())
    }

    /// Values, in column order.
    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.cells.0.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.0.is_empty()
    }
}

/// Ordered cell map; serialized as a JSON object in column order.
#[derive(Debug, Clone, PartialEq, Default)]
struct Cells(Vec<(String, CellValue)>);

impl Serialize for Cells {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Cells {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CellsVisitor;

        impl<'de> Visitor<'de> for CellsVisitor {
            type Value = Cells;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column id to cell value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Cells, A::Error> {
                let mut cells = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, CellValue>()? {
                    cells.push((k, v));
                }
                Ok(Cells(cells))
            }
        }

        deserializer.deserialize_map(CellsVisitor)
    }
}

// =============================================================================
// Normalized Table
// =============================================================================

/// Canonical in-memory table, independent of the source format.
///
/// Every row's keys are exactly the column ids, in column order, and at most
/// the preview cap of rows is materialized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TableParts")]
pub struct NormalizedTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// Data rows in the source before the preview cap was applied.
    pub total_rows: usize,
}

impl NormalizedTable {
    /// The "no data" table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from columns and positional records.
    ///
    /// Records shorter than the header are right-padded with empty text,
    /// longer ones are truncated to the header width. Only the first `limit`
    /// records are kept; each gets a 1-based `rowIndex`.
    pub fn from_records<I>(columns: Vec<Column>, records: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = Vec<CellValue>>,
    {
        let width = columns.len();
        let mut rows = Vec::new();
        let mut total_rows = 0;

        for mut record in records {
            total_rows += 1;
            if rows.len() >= limit {
                continue;
            }
            record.resize(width, CellValue::empty());
            let cells = columns
                .iter()
                .map(|c| c.id.clone())
                .zip(record)
                .collect();
            rows.push(Row::new(rows.len() + 1, cells));
        }

        Self {
            columns,
            rows,
            total_rows,
        }
    }

    /// Build from externally assembled rows, validating the invariants.
    pub fn try_new(columns: Vec<Column>, rows: Vec<Row>) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !is_identifier_safe(&column.id) {
                return Err(TableError::InvalidColumnId(column.id.clone()));
            }
            if !seen.insert(column.id.as_str()) {
                return Err(TableError::DuplicateColumnId(column.id.clone()));
            }
        }

        for row in &rows {
            let matches = row.len() == columns.len()
                && row.keys().zip(&columns).all(|(k, c)| k == c.id);
            if !matches {
                return Err(TableError::RowKeyMismatch {
                    row_index: row.row_index,
                });
            }
        }

        let total_rows = rows.len();
        Ok(Self {
            columns,
            rows,
            total_rows,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    /// Column ids, in order.
    pub fn column_ids(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.id.clone()).collect()
    }
}

/// Wire form of a table; checked by [`NormalizedTable::try_new`] on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableParts {
    columns: Vec<Column>,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    total_rows: usize,
}

impl TryFrom<TableParts> for NormalizedTable {
    type Error = TableError;

    fn try_from(parts: TableParts) -> Result<Self, TableError> {
        let mut table = Self::try_new(parts.columns, parts.rows)?;
        table.total_rows = parts.total_rows.max(table.rows.len());
        Ok(table)
    }
}

// =============================================================================
// Pattern Descriptor & Side-Channel Metadata
// =============================================================================

/// Pattern proposed by the inference service; read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDescriptor {
    #[serde(default)]
    pub target_columns: BTreeSet<String>,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub flags: String,
    #[serde(default)]
    pub replacement: String,
    #[serde(rename = "global", default)]
    pub apply_globally: bool,
}

/// Pattern applied to one column, as reported by the transform service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnPattern {
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub flags: String,
    #[serde(default)]
    pub replacement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// Set when the service rejected the pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decoded `X-Regex-Info` side channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegexInfo {
    #[serde(default)]
    pub target_columns: Vec<String>,
    #[serde(default)]
    pub by_column: BTreeMap<String, ColumnPattern>,
    /// Raw column-detection answer, kept opaque.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub call_a: serde_json::Value,
}

/// Decoded `X-Match-Stats` side channel: column id to total matches.
pub type MatchStats = BTreeMap<String, u64>;

/// Sample of transformed rows returned by the preview service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    #[serde(default)]
    pub processed_rows: Vec<serde_json::Value>,
    #[serde(default)]
    pub match_stats: MatchStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols(ids: &[&str]) -> Vec<Column> {
        ids.iter().map(|id| Column::new(*id, *id)).collect()
    }

    #[test]
    fn test_from_records_pads_and_truncates() {
        let table = NormalizedTable::from_records(
            cols(&["a", "b"]),
            vec![
                vec!["1".into()],
                vec!["1".into(), "2".into(), "3".into()],
            ],
            20,
        );

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("b"), Some(&CellValue::empty()));
        assert_eq!(table.rows[1].len(), 2);
        assert_eq!(table.rows[1].get("b"), Some(&CellValue::from("2")));
    }

    #[test]
    fn test_from_records_applies_limit_and_counts_total() {
        let records = (0..30).map(|i| vec![CellValue::Int(i)]);
        let table = NormalizedTable::from_records(cols(&["n"]), records, 20);

        assert_eq!(table.rows.len(), 20);
        assert_eq!(table.total_rows, 30);
        assert_eq!(table.rows[0].row_index, 1);
        assert_eq!(table.rows[19].row_index, 20);
    }

    #[test]
    fn test_try_new_rejects_mismatched_keys() {
        let row = Row::new(1, vec![("b".into(), "x".into()), ("a".into(), "y".into())]);
        let err = NormalizedTable::try_new(cols(&["a", "b"]), vec![row]).unwrap_err();
        assert_eq!(err, TableError::RowKeyMismatch { row_index: 1 });
    }

    #[test]
    fn test_try_new_rejects_unsafe_and_duplicate_ids() {
        let err = NormalizedTable::try_new(cols(&["a b"]), vec![]).unwrap_err();
        assert_eq!(err, TableError::InvalidColumnId("a b".into()));

        let err = NormalizedTable::try_new(cols(&["a", "a"]), vec![]).unwrap_err();
        assert_eq!(err, TableError::DuplicateColumnId("a".into()));
    }

    #[test]
    fn test_deserialize_validates_row_keys() {
        let bad = json!({
            "columns": [{"id": "a", "label": "a"}, {"id": "b", "label": "b"}],
            "rows": [{"rowIndex": 1, "cells": {"b": "x", "a": "y"}}],
            "totalRows": 1
        });
        let err = serde_json::from_value::<NormalizedTable>(bad).unwrap_err();
        assert!(err.to_string().contains("Row 1 keys"));

        let unsafe_id = json!({"columns": [{"id": "a-b", "label": "a-b"}]});
        assert!(serde_json::from_value::<NormalizedTable>(unsafe_id).is_err());
    }

    #[test]
    fn test_deserialize_round_trips_valid_table() {
        let table = NormalizedTable::from_records(
            cols(&["a", "b"]),
            (0..30).map(|i| vec![CellValue::Int(i), "x".into()]),
            20,
        );
        let back: NormalizedTable = serde_json::from_value(serde_json::to_value(&table).unwrap()).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.total_rows, 30);
    }

    #[test]
    fn test_row_serializes_in_column_order() {
        let row = Row::new(
            1,
            vec![("Zeta".into(), "z".into()), ("Alpha".into(), CellValue::Int(3))],
        );
        let text = serde_json::to_string(&row).unwrap();
        assert_eq!(text, r#"{"rowIndex":1,"cells":{"Zeta":"z","Alpha":3}}"#);

        let back: Row = serde_json::from_str(&text).unwrap();
        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_pattern_descriptor_wire_names() {
        let descriptor: PatternDescriptor = serde_json::from_value(json!({
            "targetColumns": ["Email"],
            "pattern": "\\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\\.[A-Za-z]{2,7}\\b",
            "flags": "i",
            "replacement": "REDACTED",
            "global": true
        }))
        .unwrap();

        assert!(descriptor.apply_globally);
        assert!(descriptor.target_columns.contains("Email"));
        assert_eq!(serde_json::to_value(&descriptor).unwrap()["global"], true);
    }

    #[test]
    fn test_blank_cells() {
        assert!(CellValue::from("   ").is_blank());
        assert!(!CellValue::Int(0).is_blank());
        assert_eq!(CellValue::Float(1.5).to_string(), "1.5");
    }
}
