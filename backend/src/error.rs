//! Error types for the tabmatch engine and its host surfaces.
//!
//! - [`TableError`] - malformed table construction
//! - [`SchemaError`] - a rule set that does not fit the tables it runs on
//! - [`CsvError`] - CSV import errors
//! - [`RuleSetError`] - rule-set file loading and schema validation
//! - [`ExportError`] - writing a table out
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP surface errors
//!
//! Recoverable, per-rule transform failures are not errors in this sense; they
//! are collected as [`crate::engine::RuleApplicationError`] records.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Table Errors
// =============================================================================

/// Errors raised while building a [`crate::models::Table`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// A column does not have the same number of values as the first one.
    #[error("Column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Two columns share a name.
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Which table a column reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    Source,
    Target,
    Input,
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
            Self::Input => write!(f, "input"),
        }
    }
}

/// Structural problems that fail a whole `match`/`transform` call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Matching needs at least one rule.
    #[error("Match rule set is empty")]
    EmptyRuleSet,

    /// A rule references a column the table does not have.
    #[error("Missing {table} column: {column}")]
    MissingColumn { table: TableRole, column: String },

    /// A match rule threshold is outside [0, 1].
    #[error("Match rule {rule_index}: threshold {threshold} is outside [0, 1]")]
    InvalidThreshold { rule_index: usize, threshold: f64 },
}

impl SchemaError {
    pub fn missing(table: TableRole, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table,
            column: column.into(),
        }
    }
}

// =============================================================================
// CSV Import Errors
// =============================================================================

/// Errors during CSV import.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode bytes.
    #[error("Failed to decode content as {encoding}")]
    EncodingError { encoding: String },

    /// Malformed record.
    #[error("Line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// Header row produced an invalid table (e.g. duplicate names).
    #[error("Invalid table: {0}")]
    Table(#[from] TableError),
}

// =============================================================================
// Rule Set Errors
// =============================================================================

/// Errors while loading a rule-set document.
#[derive(Debug, Error)]
pub enum RuleSetError {
    /// IO error.
    #[error("Failed to read rule set: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON syntax or shape error.
    #[error("Rule set JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// JSON Schema validation failed.
    #[error("Rule set failed validation: {}", errors.join("; "))]
    Invalid { errors: Vec<String> },
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing a table out.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON write error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File extension is neither `.csv` nor `.json`.
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::pipeline::run_pipeline`] and
/// friends. It wraps the lower-level errors so `?` works across boundaries.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV import error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Rule set loading error.
    #[error("Rule set error: {0}")]
    RuleSet(#[from] RuleSetError),

    /// The rules do not fit the tables.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Source table has no rows.
    #[error("No records to match")]
    EmptyInput,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for engine calls.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for rule-set operations.
pub type RuleSetResult<T> = Result<T, RuleSetError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CsvError -> PipelineError
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // SchemaError -> PipelineError
        let schema_err = SchemaError::missing(TableRole::Target, "email");
        let pipeline_err: PipelineError = schema_err.into();
        assert!(pipeline_err.to_string().contains("target column: email"));
    }

    #[test]
    fn test_threshold_error_format() {
        let err = SchemaError::InvalidThreshold {
            rule_index: 2,
            threshold: 1.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("rule 2"));
        assert!(msg.contains("1.5"));
    }

    #[test]
    fn test_rule_set_invalid_joins_messages() {
        let err = RuleSetError::Invalid {
            errors: vec!["a is required".into(), "b must be a number".into()],
        };
        assert_eq!(
            err.to_string(),
            "Rule set failed validation: a is required; b must be a number"
        );
    }
}
