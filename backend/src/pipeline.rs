//! High-level pipeline: import, match, transform.
//!
//! These functions wrap the pure engine calls with CSV import and progress
//! logging. They are what the CLI and the HTTP server call.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabmatch::pipeline::run_files;
//! use std::path::Path;
//!
//! let output = run_files(
//!     Path::new("customers.csv"),
//!     Path::new("crm.csv"),
//!     Path::new("rules.json"),
//! )?;
//! println!("{}", output.summary());
//! ```

use std::path::Path;

use serde::Serialize;

use crate::engine::{
    match_report, transform, MatchReport, RowMatch, RuleApplicationError, TransformOutcome, ValueCoercionWarning,
};
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{log_error, log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::models::Table;
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};
use crate::rules::{MatchRule, RuleSet, TransformRule};

/// How many individual problems are logged before summarizing.
const LOG_SAMPLE: usize = 3;

/// What the importer detected for one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for CsvInfo {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers.clone(),
            row_count: parsed.table.row_count(),
        }
    }
}

/// Result of a full match-then-transform run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Merged and transformed rows.
    pub table: Table,
    pub matches: Vec<RowMatch>,
    /// Source rows dropped for lack of a match.
    pub unmatched: Vec<usize>,
    pub source_rows: usize,
    pub target_rows: usize,
    pub transform_errors: Vec<RuleApplicationError>,
    pub warnings: Vec<ValueCoercionWarning>,
    pub source_info: Option<CsvInfo>,
    pub target_info: Option<CsvInfo>,
}

impl PipelineOutput {
    pub fn matched_rows(&self) -> usize {
        self.matches.len()
    }

    /// `"ready"` when every rule applied, `"warning"` otherwise.
    pub fn status(&self) -> &'static str {
        if self.transform_errors.is_empty() && self.warnings.is_empty() {
            "ready"
        } else {
            "warning"
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{}/{} source rows matched, {} output columns, {} rule errors, {} coerced cells",
            self.matched_rows(),
            self.source_rows,
            self.table.column_count(),
            self.transform_errors.len(),
            self.warnings.len()
        )
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Run the pipeline on two CSV files and a rule-set file.
pub fn run_files(source: &Path, target: &Path, rules: &Path) -> PipelineResult<PipelineOutput> {
    log_info(format!("📜 Loading rules from {}", rules.display()));
    let rule_set = RuleSet::load(rules)?;

    let (source_table, source_info) = load_table(source)?;
    let (target_table, target_info) = load_table(target)?;

    let mut output = run_pipeline(&source_table, &target_table, &rule_set)?;
    output.source_info = Some(source_info);
    output.target_info = Some(target_info);
    Ok(output)
}

/// Run the pipeline on raw CSV bytes, e.g. from an upload.
pub fn run_bytes(source: &[u8], target: &[u8], rules: &RuleSet) -> PipelineResult<PipelineOutput> {
    let source_parsed = parse_bytes_auto(source)?;
    log_parse("source", &source_parsed);
    let target_parsed = parse_bytes_auto(target)?;
    log_parse("target", &target_parsed);

    let mut output = run_pipeline(&source_parsed.table, &target_parsed.table, rules)?;
    output.source_info = Some(CsvInfo::from(&source_parsed));
    output.target_info = Some(CsvInfo::from(&target_parsed));
    Ok(output)
}

/// Match `source` against `target`, then transform the merged rows.
pub fn run_pipeline(source: &Table, target: &Table, rules: &RuleSet) -> PipelineResult<PipelineOutput> {
    if source.is_empty() {
        log_error("Source table has no rows");
        return Err(PipelineError::EmptyInput);
    }

    let report = match_only(source, target, rules)?;
    let outcome = transform_only(&report.table, &rules.transform_rules)?;

    let output = PipelineOutput {
        table: outcome.table,
        matches: report.matches,
        unmatched: report.unmatched,
        source_rows: source.row_count(),
        target_rows: target.row_count(),
        transform_errors: outcome.errors,
        warnings: outcome.warnings,
        source_info: None,
        target_info: None,
    };
    log_success(output.summary());
    Ok(output)
}

/// Matching step with progress logs.
pub fn match_only(source: &Table, target: &Table, rules: &RuleSet) -> PipelineResult<MatchReport> {
    log_info(format!(
        "🔗 Matching {} source rows against {} target rows",
        source.row_count(),
        target.row_count()
    ));
    print_match_rules(&rules.match_rules);

    let report = match_report(source, target, &rules.match_rules, &rules.options)?;

    log_success(format!("{} rows matched", report.matched_count()));
    if !report.unmatched.is_empty() {
        log_warning(format!(
            "{} source rows without a match (rows: {})",
            report.unmatched.len(),
            sample(&report.unmatched)
        ));
    }
    Ok(report)
}

/// Transform step with progress logs.
pub fn transform_only(table: &Table, rules: &[TransformRule]) -> PipelineResult<TransformOutcome> {
    if rules.is_empty() {
        log_info("No transform rules, keeping matched rows as they are");
    } else {
        log_info(format!("⚙️  Applying {} transform rule(s)", rules.len()));
    }

    let outcome = transform(table, rules)?;

    for err in outcome.errors.iter().take(LOG_SAMPLE) {
        log_warning_indent(err.to_string(), 1);
    }
    if outcome.errors.len() > LOG_SAMPLE {
        log_warning_indent(format!("... +{} more rule errors", outcome.errors.len() - LOG_SAMPLE), 1);
    }
    if !outcome.warnings.is_empty() {
        let rows: Vec<usize> = outcome.warnings.iter().map(|w| w.row).collect();
        log_warning(format!(
            "{} cells could not be converted and were left empty (rows: {})",
            outcome.warnings.len(),
            sample(&rows)
        ));
    }
    Ok(outcome)
}

/// Import one CSV file with auto-detection.
pub fn load_table(path: &Path) -> PipelineResult<(Table, CsvInfo)> {
    log_info(format!("📖 Reading {}", path.display()));
    let parsed = parse_csv_file_auto(path)?;
    log_parse(&path.display().to_string(), &parsed);
    let info = CsvInfo::from(&parsed);
    Ok((parsed.table, info))
}

// =============================================================================
// Log helpers
// =============================================================================

fn log_parse(label: &str, parsed: &ParseResult) {
    log_success(format!(
        "{}: {} rows, {} columns (encoding {}, separator '{}')",
        label,
        parsed.table.row_count(),
        parsed.headers.len(),
        parsed.encoding,
        format_delimiter(parsed.delimiter)
    ));
}

fn print_match_rules(rules: &[MatchRule]) {
    for rule in rules {
        log_info_indent(
            format!(
                "{} ~ {} ({}, threshold {:.2}{})",
                rule.source_column,
                rule.target_column,
                rule.match_type,
                rule.threshold,
                if rule.case_sensitive { ", case sensitive" } else { "" }
            ),
            1,
        );
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}

/// First few row numbers, e.g. `0, 4, 9... +12`.
fn sample(rows: &[usize]) -> String {
    let shown: Vec<String> = rows.iter().take(5).map(|r| r.to_string()).collect();
    if rows.len() > 5 {
        format!("{}... +{}", shown.join(", "), rows.len() - 5)
    } else {
        shown.join(", ")
    }
}
