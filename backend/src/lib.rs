//! # tabmatch - rule-driven row matching and column transformation
//!
//! tabmatch pairs the rows of a source table with their best counterpart in a
//! target table, merges each pair, then derives new columns from the merged
//! rows. Both steps are driven by a JSON rule set.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌────────────┐     ┌────────────┐     ┌────────────┐
//! │ CSV files  │────▶│   Parser   │────▶│  Matcher   │────▶│Transformer │────▶ CSV / JSON
//! │ + rules    │     │ (auto-enc) │     │ (scoring)  │     │ (columns)  │
//! └────────────┘     └────────────┘     └────────────┘     └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabmatch::{match_tables, transform, MatchOptions, MatchRule, TransformRule};
//!
//! let rules = vec![MatchRule::fuzzy("name", "full_name", 0.8)];
//! let merged = match_tables(&source, &target, &rules, &MatchOptions::default())?;
//! let outcome = transform(&merged, &[TransformRule::number_format("balance", "balance", 2)])?;
//! println!("{}", outcome.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`models`] - Value, Column, Table
//! - [`rules`] - Match and transform rules, rule sets
//! - [`engine`] - Matcher and transformer
//! - [`parser`] - CSV import with auto-detection
//! - [`export`] - CSV/TSV/JSON output
//! - [`validation`] - Rule-set schema validation
//! - [`pipeline`] - Import, match, transform with progress logs
//! - [`logging`] - Log broadcaster
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;
pub mod rules;

// Engine
pub mod engine;

// Import / export
pub mod export;
pub mod parser;

// Validation
pub mod validation;

// Orchestration
pub mod config;
pub mod logging;
pub mod pipeline;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError, ExportError, PipelineError, RuleSetError, SchemaError, ServerError, TableError, TableRole,
};

// =============================================================================
// Re-exports - Models and rules
// =============================================================================

pub use models::{Column, Table, Value};
pub use rules::{example_rule_set, MatchRule, MatchType, RuleSet, TransformRule, TransformType};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use engine::{
    match_report, match_tables, transform, FuzzyScorer, MatchOptions, MatchReport, RowMatch, RuleApplicationError,
    ThresholdPolicy, TransformOutcome, ValueCoercionWarning,
};

// =============================================================================
// Re-exports - Import, export, validation
// =============================================================================

pub use export::{export_table, to_csv_string, ExportFormat};
pub use parser::{parse_bytes_auto, parse_csv, parse_csv_file_auto, ParseResult};
pub use validation::{is_valid_rule_set, validate_rule_set};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::AppConfig;
pub use pipeline::{run_bytes, run_files, run_pipeline, CsvInfo, PipelineOutput};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
