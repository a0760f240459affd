//! Column transformer
//!
//! Applies [`TransformRule`]s to a table and returns a new table. Rules run in
//! order and always read the input table, never each other's output. A rule
//! that cannot run (bad parameters, unknown type) is recorded and skipped; the
//! remaining rules still apply.

use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::operations::{date_pattern, join_values, parse_date, render_date, round_number};
use crate::error::{SchemaError, SchemaResult, TableRole};
use crate::models::{Table, Value, MISSING_PLACEHOLDER};
use crate::rules::{Parameters, TransformRule, TransformType};

const DEFAULT_DECIMALS: i64 = 2;
const DEFAULT_SEPARATOR: &str = " ";

// =============================================================================
// Outcome records
// =============================================================================

/// A rule that was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleApplicationError {
    pub rule_index: usize,
    pub transform_type: String,
    pub target_column: String,
    pub message: String,
}

impl fmt::Display for RuleApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule {} ({} -> {}): {}",
            self.rule_index, self.transform_type, self.target_column, self.message
        )
    }
}

/// A cell that could not be converted and became missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueCoercionWarning {
    pub rule_index: usize,
    pub row: usize,
    pub column: String,
    pub value: String,
    pub reason: String,
}

/// Result of [`transform`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub table: Table,
    pub errors: Vec<RuleApplicationError>,
    pub warnings: Vec<ValueCoercionWarning>,
}

impl TransformOutcome {
    /// No rule was skipped.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows, {} columns, {} rule errors, {} coerced cells",
            self.table.row_count(),
            self.table.column_count(),
            self.errors.len(),
            self.warnings.len()
        )
    }
}

// =============================================================================
// Transform
// =============================================================================

/// Apply `rules` to `table`.
///
/// Every source column must exist in `table`, otherwise the call fails with
/// [`SchemaError::MissingColumn`] before any rule runs.
pub fn transform(table: &Table, rules: &[TransformRule]) -> SchemaResult<TransformOutcome> {
    for rule in rules {
        if let Some(col) = rule.source_columns.iter().find(|c| !table.has_column(c)) {
            return Err(SchemaError::missing(TableRole::Input, col));
        }
    }

    let mut output = table.clone();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (rule_index, rule) in rules.iter().enumerate() {
        let mut rule_warnings = Vec::new();
        match apply_rule(table, rule_index, rule, &mut rule_warnings) {
            Ok(values) => {
                output.set_column(rule.target_column.clone(), values);
                warnings.append(&mut rule_warnings);
            }
            Err(message) => errors.push(RuleApplicationError {
                rule_index,
                transform_type: rule.transform_type.to_string(),
                target_column: rule.target_column.clone(),
                message,
            }),
        }
    }

    Ok(TransformOutcome {
        table: output,
        errors,
        warnings,
    })
}

fn apply_rule(
    table: &Table,
    rule_index: usize,
    rule: &TransformRule,
    warnings: &mut Vec<ValueCoercionWarning>,
) -> Result<Vec<Value>, String> {
    if rule.target_column.trim().is_empty() {
        return Err("target column name is empty".to_string());
    }
    if rule.source_columns.is_empty() {
        return Err("no source columns".to_string());
    }

    let inputs = rule
        .source_columns
        .iter()
        .map(|name| {
            table
                .column(name)
                .map(|c| c.values.as_slice())
                .ok_or_else(|| format!("column '{name}' not found"))
        })
        .collect::<Result<Vec<&[Value]>, String>>()?;

    let mut warn = |row: usize, value: &Value, reason: String| {
        warnings.push(ValueCoercionWarning {
            rule_index,
            row,
            column: rule.source_columns[0].clone(),
            value: value.to_string(),
            reason,
        });
    };

    match &rule.transform_type {
        TransformType::DateFormat => {
            let source_format = param_str(&rule.parameters, "source_format")?;
            if let Some(pattern) = source_format {
                date_pattern(pattern)?;
            }
            let target_format =
                param_str(&rule.parameters, "target_format")?.ok_or("missing parameter 'target_format'")?;
            let items = date_pattern(target_format)?;
            if let Some(sample) = chrono::NaiveDate::from_ymd_opt(2000, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)) {
                render_date(&sample, &items)
                    .map_err(|_| format!("date pattern '{target_format}' cannot be rendered"))?;
            }

            let mut out = Vec::with_capacity(table.row_count());
            for (row, value) in inputs[0].iter().enumerate() {
                let rendered = parse_date(value, source_format).and_then(|d| render_date(&d, &items).ok());
                match rendered {
                    Some(text) => out.push(Value::Text(text)),
                    None => {
                        if !value.is_missing() {
                            warn(row, value, "not a recognizable date".to_string());
                        }
                        out.push(Value::Missing);
                    }
                }
            }
            Ok(out)
        }

        TransformType::NumberFormat => {
            let decimals = param_decimals(&rule.parameters)?;
            let mut out = Vec::with_capacity(table.row_count());
            for (row, value) in inputs[0].iter().enumerate() {
                match round_number(value, decimals) {
                    Some(rounded) => out.push(rounded),
                    None => {
                        if !value.is_missing() {
                            warn(row, value, "not a number".to_string());
                        }
                        out.push(Value::Missing);
                    }
                }
            }
            Ok(out)
        }

        TransformType::Concatenate => {
            let separator = param_str(&rule.parameters, "separator")?.unwrap_or(DEFAULT_SEPARATOR);
            let placeholder = param_str(&rule.parameters, "placeholder")?.unwrap_or(MISSING_PLACEHOLDER);
            let out = (0..table.row_count())
                .map(|row| {
                    let cells: Vec<&Value> = inputs.iter().map(|col| &col[row]).collect();
                    Value::Text(join_values(&cells, separator, placeholder))
                })
                .collect();
            Ok(out)
        }

        TransformType::Other(name) => Err(format!("unknown transform type '{name}'")),
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Optional string parameter. Present but not a string is an error.
fn param_str<'a>(params: &'a Parameters, key: &str) -> Result<Option<&'a str>, String> {
    match params.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(format!("parameter '{key}' must be a string, got {other}")),
    }
}

/// `decimals` as an integer; whole-valued floats such as `2.0` are accepted.
fn param_decimals(params: &Parameters) -> Result<i32, String> {
    let decimals = match params.get("decimals") {
        None | Some(JsonValue::Null) => DEFAULT_DECIMALS,
        Some(JsonValue::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 && f.abs() <= i32::MAX as f64 => f as i64,
            _ => return Err(format!("parameter 'decimals' must be an integer, got {n}")),
        },
        Some(other) => return Err(format!("parameter 'decimals' must be an integer, got {other}")),
    };
    i32::try_from(decimals).map_err(|_| format!("parameter 'decimals' out of range: {decimals}"))
}
