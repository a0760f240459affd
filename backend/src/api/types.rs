//! REST API types for the preview endpoint.

use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::engine::{RuleApplicationError, ValueCoercionWarning};
use crate::models::Value;
use crate::pipeline::{CsvInfo, PipelineOutput};

/// Response to `POST /api/preview`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub job_id: String,

    /// "ready" or "warning"
    pub status: String,

    pub columns: Vec<String>,

    /// First rows of the output table, cells in `columns` order.
    pub rows: Vec<Vec<Value>>,

    pub total_rows: usize,
    pub matched_rows: usize,
    pub unmatched_rows: usize,

    pub errors: Vec<RuleApplicationError>,
    pub warnings: Vec<ValueCoercionWarning>,

    pub source: Option<CsvInfo>,
    pub target: Option<CsvInfo>,
}

impl PreviewResponse {
    /// Build a response showing at most `limit` rows of `output`.
    pub fn from_output(output: PipelineOutput, limit: usize) -> Self {
        let preview = output.table.head(limit);
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: output.status().to_string(),
            columns: preview.column_names().iter().map(|c| c.to_string()).collect(),
            rows: preview.rows().map(|row| row.into_iter().cloned().collect()).collect(),
            total_rows: output.table.row_count(),
            matched_rows: output.matched_rows(),
            unmatched_rows: output.unmatched.len(),
            errors: output.transform_errors,
            warnings: output.warnings,
            source: output.source_info,
            target: output.target_info,
        }
    }
}

/// Create an error response body.
pub fn error_response(error: &str) -> JsonValue {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "columns": [],
        "rows": [],
        "totalRows": 0
    })
}
