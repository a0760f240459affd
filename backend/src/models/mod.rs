//! Domain models shared by the engine and its hosts.
//!
//! - [`Value`] - a loosely typed cell (text, number, date or missing)
//! - [`Column`] - a named sequence of cells
//! - [`Table`] - ordered, equal-length columns with unique names
//!
//! Tables are immutable from the engine's point of view: every operation that
//! "changes" a table returns a new one.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TableError;

/// Text a missing cell renders as when it has to be turned into a string.
pub const MISSING_PLACEHOLDER: &str = "nan";

/// Layout used when a date cell is string-cast.
pub const DATE_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw cell contents treated as missing on import.
const NA_MARKERS: &[&str] = &["", "nan", "NaN", "NA", "N/A", "n/a", "null", "NULL", "None", "#N/A"];

// =============================================================================
// Value
// =============================================================================

/// A single cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The missing-sentinel. Distinct from an empty string.
    #[default]
    Missing,
    Text(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDateTime),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Infer a typed value from raw imported text.
    ///
    /// Empty cells and the usual NA markers become [`Value::Missing`],
    /// integers and floats are recognised, everything else stays text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if NA_MARKERS.contains(&trimmed) {
            return Value::Missing;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Integer(i);
        }
        if looks_numeric(trimmed) {
            if let Ok(f) = trimmed.parse::<f64>() {
                return Value::Float(f);
            }
        }
        Value::Text(raw.to_string())
    }

    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Missing | Value::Date(_) => None,
        }
    }

    /// Convert from a JSON value. Arrays and objects are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Missing,
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Missing),
            },
            other => Value::Text(other.to_string()),
        }
    }

    /// Convert to a JSON value. Missing and non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Missing => serde_json::Value::Null,
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Date(d) => serde_json::Value::String(d.format(DATE_DISPLAY_FORMAT).to_string()),
        }
    }
}

/// Only hand strings that look like decimal numbers to `f64::from_str`, which
/// would otherwise also accept words like "inf" or "NaN".
fn looks_numeric(s: &str) -> bool {
    let body = s.strip_prefix(&['-', '+'][..]).unwrap_or(s);
    body.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '.')
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
}

/// String cast used by matching and concatenation.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => f.write_str(MISSING_PLACEHOLDER),
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => fmt_float(*x, f),
            Value::Date(d) => write!(f, "{}", d.format(DATE_DISPLAY_FORMAT)),
        }
    }
}

fn fmt_float(x: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if x.is_nan() {
        f.write_str("nan")
    } else if x.is_infinite() {
        f.write_str(if x > 0.0 { "inf" } else { "-inf" })
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Missing)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Strings in [`DATE_DISPLAY_FORMAT`] come back as [`Value::Date`], so a
/// serialized table keeps its date cells.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if let serde_json::Value::String(s) = &raw {
            if let Ok(date) = NaiveDateTime::parse_from_str(s, DATE_DISPLAY_FORMAT) {
                return Ok(Value::Date(date));
            }
        }
        Ok(Value::from_json(&raw))
    }
}

// =============================================================================
// Column / Table
// =============================================================================

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Build a text column from string literals. Handy in tests and fixtures.
    pub fn from_strs(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(name, values.iter().map(|s| Value::text(*s)).collect())
    }
}

/// An ordered set of equal-length, uniquely named columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    columns: Vec<Column>,
}

#[derive(Deserialize)]
struct RawTable {
    columns: Vec<Column>,
}

impl TryFrom<RawTable> for Table {
    type Error = TableError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        Table::new(raw.columns)
    }
}

impl Table {
    /// Build a table, checking that column lengths agree and names are unique.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        if let Some(first) = columns.first() {
            let expected = first.values.len();
            for (i, column) in columns.iter().enumerate() {
                if column.values.len() != expected {
                    return Err(TableError::LengthMismatch {
                        column: column.name.clone(),
                        expected,
                        actual: column.values.len(),
                    });
                }
                if columns[..i].iter().any(|c| c.name == column.name) {
                    return Err(TableError::DuplicateColumn(column.name.clone()));
                }
            }
        }
        Ok(Self { columns })
    }

    /// Build from columns whose lengths and names are already known to agree.
    pub(crate) fn from_valid_columns(columns: Vec<Column>) -> Self {
        debug_assert!(Table::new(columns.clone()).is_ok());
        Self { columns }
    }

    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from row-major data.
    ///
    /// Short rows are padded with [`Value::Missing`]; cells beyond the last
    /// header are ignored.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or_default());
            }
        }

        Self::new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `(row, column)`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// One row as ordered `(column name, value)` pairs.
    pub fn row(&self, index: usize) -> Option<Vec<(&str, &Value)>> {
        if index >= self.row_count() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.as_str(), &c.values[index]))
                .collect(),
        )
    }

    /// Iterate rows as cell vectors in column order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.row_count()).map(move |r| self.columns.iter().map(|c| &c.values[r]).collect())
    }

    /// Return a table with `name` set to `values`.
    ///
    /// An existing column keeps its position; a new one is appended.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Value>) -> Result<Self, TableError> {
        let name = name.into();
        if !self.columns.is_empty() && values.len() != self.row_count() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.row_count(),
                actual: values.len(),
            });
        }
        self.set_column(name, values);
        Ok(self)
    }

    /// In-place form of [`Table::with_column`] for callers that produced
    /// `values` from this table's own rows.
    pub(crate) fn set_column(&mut self, name: String, values: Vec<Value>) {
        match self.column_index(&name) {
            Some(i) => self.columns[i].values = values,
            None => self.columns.push(Column::new(name, values)),
        }
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values.iter().take(n).cloned().collect()))
                .collect(),
        }
    }

    /// Rows as JSON objects keyed by column name, in column order.
    pub fn to_records(&self) -> Vec<serde_json::Value> {
        (0..self.row_count())
            .map(|r| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), c.values[r].to_json()))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect()
    }
}
