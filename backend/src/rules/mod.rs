//! Rule definitions
//!
//! A [`RuleSet`] bundles the ordered match rules, the ordered transform rules
//! and the matcher options for one run. Rule sets are plain values: hosts build
//! or load them and pass them into every engine call.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::Path;

use crate::engine::MatchOptions;
use crate::error::{RuleSetError, RuleSetResult};
use crate::validation::validate_rule_set;

/// Named transform options, e.g. `{"separator": "-"}`.
pub type Parameters = serde_json::Map<String, JsonValue>;

// =============================================================================
// Match rules
// =============================================================================

/// How a column pair is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// 1.0 when the normalized strings are equal, 0.0 otherwise
    Exact,
    /// Normalized string similarity in [0, 1]
    Fuzzy,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// Compare one source column with one target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRule {
    pub source_column: String,
    pub target_column: String,
    pub match_type: MatchType,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_threshold() -> f64 {
    0.9
}

impl MatchRule {
    pub fn exact(source_column: &str, target_column: &str) -> Self {
        Self {
            source_column: source_column.to_string(),
            target_column: target_column.to_string(),
            match_type: MatchType::Exact,
            threshold: default_threshold(),
            case_sensitive: false,
        }
    }

    pub fn fuzzy(source_column: &str, target_column: &str, threshold: f64) -> Self {
        Self {
            match_type: MatchType::Fuzzy,
            threshold,
            ..Self::exact(source_column, target_column)
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }
}

// =============================================================================
// Transform rules
// =============================================================================

/// Kind of derivation a transform rule performs.
///
/// Unknown names are kept as [`TransformType::Other`] so that the transformer
/// can report them per rule instead of failing the whole rule set on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransformType {
    DateFormat,
    NumberFormat,
    Concatenate,
    Other(String),
}

impl TransformType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DateFormat => "date_format",
            Self::NumberFormat => "number_format",
            Self::Concatenate => "concatenate",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for TransformType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "date_format" => Self::DateFormat,
            "number_format" => Self::NumberFormat,
            "concatenate" => Self::Concatenate,
            _ => Self::Other(name),
        }
    }
}

impl From<TransformType> for String {
    fn from(kind: TransformType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive `target_column` from `source_columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRule {
    pub source_columns: Vec<String>,
    pub target_column: String,
    pub transform_type: TransformType,
    #[serde(default)]
    pub parameters: Parameters,
}

impl TransformRule {
    pub fn new(source_columns: Vec<String>, target_column: &str, transform_type: TransformType) -> Self {
        Self {
            source_columns,
            target_column: target_column.to_string(),
            transform_type,
            parameters: Parameters::new(),
        }
    }

    /// Reformat a date column.
    pub fn date_format(source: &str, target: &str, source_format: &str, target_format: &str) -> Self {
        Self::new(vec![source.to_string()], target, TransformType::DateFormat)
            .with_parameter("source_format", source_format)
            .with_parameter("target_format", target_format)
    }

    /// Coerce to a number rounded to `decimals` fractional digits.
    pub fn number_format(source: &str, target: &str, decimals: i64) -> Self {
        Self::new(vec![source.to_string()], target, TransformType::NumberFormat)
            .with_parameter("decimals", decimals)
    }

    /// Join several columns with `separator`.
    pub fn concatenate(sources: &[&str], target: &str, separator: &str) -> Self {
        Self::new(
            sources.iter().map(|s| s.to_string()).collect(),
            target,
            TransformType::Concatenate,
        )
        .with_parameter("separator", separator)
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

// =============================================================================
// Rule set
// =============================================================================

/// Everything one run needs besides the tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub match_rules: Vec<MatchRule>,

    #[serde(default)]
    pub transform_rules: Vec<TransformRule>,

    #[serde(default)]
    pub options: MatchOptions,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl RuleSet {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            match_rules: Vec::new(),
            transform_rules: Vec::new(),
            options: MatchOptions::default(),
        }
    }

    pub fn with_match_rule(mut self, rule: MatchRule) -> Self {
        self.match_rules.push(rule);
        self
    }

    pub fn with_transform_rule(mut self, rule: TransformRule) -> Self {
        self.transform_rules.push(rule);
        self
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse and schema-check a rule set from JSON text.
    pub fn from_json(json: &str) -> RuleSetResult<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Schema-check and deserialize an already parsed JSON document.
    pub fn from_value(value: &JsonValue) -> RuleSetResult<Self> {
        validate_rule_set(value).map_err(|errors| RuleSetError::Invalid { errors })?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Schema-check JSON text without building a rule set.
    pub fn validate_json(json: &str) -> Result<(), Vec<String>> {
        let value: JsonValue = serde_json::from_str(json).map_err(|e| vec![format!("invalid JSON: {e}")])?;
        validate_rule_set(&value)
    }

    /// Load a rule set file.
    pub fn load(path: impl AsRef<Path>) -> RuleSetResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Source-table columns referenced by the match rules.
    pub fn referenced_source_columns(&self) -> Vec<String> {
        dedup(self.match_rules.iter().map(|r| r.source_column.clone()))
    }

    /// Target-table columns referenced by the match rules.
    pub fn referenced_target_columns(&self) -> Vec<String> {
        dedup(self.match_rules.iter().map(|r| r.target_column.clone()))
    }

    /// Columns the transform rules read from the matched table.
    pub fn transform_input_columns(&self) -> Vec<String> {
        dedup(
            self.transform_rules
                .iter()
                .flat_map(|r| r.source_columns.iter().cloned()),
        )
    }

    /// Check match-rule column references against the two header rows.
    ///
    /// Returns the missing columns, prefixed with the table they belong to.
    pub fn validate_headers(&self, source: &[&str], target: &[&str]) -> Result<(), Vec<String>> {
        let mut missing: Vec<String> = self
            .referenced_source_columns()
            .into_iter()
            .filter(|col| !source.contains(&col.as_str()))
            .map(|col| format!("source: {col}"))
            .collect();
        missing.extend(
            self.referenced_target_columns()
                .into_iter()
                .filter(|col| !target.contains(&col.as_str()))
                .map(|col| format!("target: {col}")),
        );

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup(columns: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for col in columns {
        if !seen.contains(&col) {
            seen.push(col);
        }
    }
    seen
}

/// Example rule set for documentation and `tabmatch example-rules`.
pub fn example_rule_set() -> RuleSet {
    RuleSet {
        version: "1.0".to_string(),
        description: "Match customers to CRM contacts by email and name".to_string(),
        match_rules: vec![
            MatchRule::exact("email", "contact_email").with_threshold(0.8),
            MatchRule::fuzzy("name", "full_name", 0.8),
        ],
        transform_rules: vec![
            TransformRule::date_format("signup", "signup_us", "%Y-%m-%d", "%m/%d/%Y"),
            TransformRule::number_format("balance", "balance_rounded", 2),
            TransformRule::concatenate(&["first_name", "last_name"], "display_name", " "),
        ],
        options: MatchOptions::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_set_serialization() {
        let rules = example_rule_set();
        let json = rules.to_json().unwrap();
        let parsed = RuleSet::from_json(&json).unwrap();
        assert_eq!(parsed, rules);
    }

    #[test]
    fn test_match_rule_defaults() {
        let rule: MatchRule = serde_json::from_value(json!({
            "source_column": "a",
            "target_column": "b",
            "match_type": "fuzzy"
        }))
        .unwrap();
        assert_eq!(rule.threshold, 0.9);
        assert!(!rule.case_sensitive);
    }

    #[test]
    fn test_unknown_transform_type_is_kept() {
        let rule: TransformRule = serde_json::from_value(json!({
            "source_columns": ["a"],
            "target_column": "b",
            "transform_type": "uppercase"
        }))
        .unwrap();
        assert_eq!(rule.transform_type, TransformType::Other("uppercase".into()));
        assert_eq!(serde_json::to_value(&rule).unwrap()["transform_type"], "uppercase");
    }

    #[test]
    fn test_schema_rejects_bad_match_type() {
        let doc = json!({
            "match_rules": [
                { "source_column": "a", "target_column": "b", "match_type": "sounds_like" }
            ]
        });
        match RuleSet::from_value(&doc) {
            Err(RuleSetError::Invalid { errors }) => assert!(!errors.is_empty()),
            other => panic!("expected schema failure, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_json() {
        assert!(RuleSet::validate_json(r#"{"match_rules": []}"#).is_ok());
        assert!(RuleSet::validate_json("{ not json").is_err());

        let errors = RuleSet::validate_json(r#"{"transform_rules": [{"target_column": "x"}]}"#).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_validate_headers() {
        let rules = example_rule_set();
        assert!(rules
            .validate_headers(&["email", "name"], &["contact_email", "full_name"])
            .is_ok());

        let missing = rules.validate_headers(&["email"], &["full_name"]).unwrap_err();
        assert_eq!(missing, vec!["source: name", "target: contact_email"]);
    }

    #[test]
    fn test_transform_input_columns_dedup() {
        let rules = RuleSet::new()
            .with_transform_rule(TransformRule::number_format("x", "x2", 1))
            .with_transform_rule(TransformRule::concatenate(&["x", "y"], "xy", "-"));
        assert_eq!(rules.transform_input_columns(), vec!["x", "y"]);
    }
}
