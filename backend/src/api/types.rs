//! REST API request and response bodies.
//!
//! Tables are returned in their normalized form: `columns` carries
//! `{ id, label }` pairs and every row is `{ rowIndex, cells }` keyed by id.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{Column, MatchStats, NormalizedTable, PatternDescriptor, RegexInfo, Row};
use crate::pipeline::ApplyOutcome;

/// Response to `POST /api/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Correlation id for this upload.
    pub file_id: String,
    pub filename: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// Data rows in the source before the preview cap.
    pub total_rows: usize,
}

impl UploadResponse {
    pub fn new(filename: impl Into<String>, table: NormalizedTable) -> Self {
        Self {
            file_id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            columns: table.columns,
            rows: table.rows,
            total_rows: table.total_rows,
        }
    }
}

/// Response to `POST /api/apply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    pub filename: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub total_rows: usize,
    pub regex_info: Option<RegexInfo>,
    pub match_stats: Option<MatchStats>,
}

impl From<ApplyOutcome> for ApplyResponse {
    fn from(outcome: ApplyOutcome) -> Self {
        Self {
            filename: outcome.filename,
            columns: outcome.table.columns,
            rows: outcome.table.rows,
            total_rows: outcome.table.total_rows,
            regex_info: outcome.regex_info,
            match_stats: outcome.match_stats,
        }
    }
}

/// Body of `POST /api/preview`: a pattern plus the file it applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewBody {
    pub file_id: String,
    #[serde(flatten)]
    pub descriptor: PatternDescriptor,
}

/// Create an error response body
pub fn error_response(message: &str) -> Value {
    json!({ "error": message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    #[test]
    fn test_upload_response_wire_names() {
        let table = NormalizedTable::from_records(
            vec![Column::new("Email", "Email")],
            vec![vec![CellValue::from("a@b.c")]],
            20,
        );
        let value = serde_json::to_value(UploadResponse::new("people.csv", table)).unwrap();

        assert_eq!(value["filename"], "people.csv");
        assert_eq!(value["totalRows"], 1);
        assert_eq!(value["rows"][0]["rowIndex"], 1);
        assert_eq!(value["rows"][0]["cells"]["Email"], "a@b.c");
        assert!(Uuid::parse_str(value["fileId"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_preview_body_is_flat() {
        let body: PreviewBody = serde_json::from_value(json!({
            "fileId": "f1",
            "targetColumns": ["Email"],
            "pattern": "@",
            "flags": "g",
            "replacement": "-",
            "global": true
        }))
        .unwrap();

        assert_eq!(body.file_id, "f1");
        assert!(body.descriptor.apply_globally);
        assert!(body.descriptor.target_columns.contains("Email"));
    }

    #[test]
    fn test_error_response() {
        assert_eq!(error_response("boom"), json!({"error": "boom"}));
    }
}
