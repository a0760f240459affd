//! JSON Schema validation for rule-set documents.
//!
//! Rule sets are checked against the embedded `schemas/rule-set.json`
//! (JSON Schema Draft 7) before they are deserialized, so every shape error is
//! reported at once instead of the first serde failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use tabmatch::validation::is_valid_rule_set;
//!
//! let rules = json!({
//!     "match_rules": [
//!         { "source_column": "email", "target_column": "mail", "match_type": "exact" }
//!     ]
//! });
//! assert!(is_valid_rule_set(&rules));
//! ```

use serde_json::Value;

const RULE_SET_SCHEMA: &str = include_str!("../../schemas/rule-set.json");

/// Validate a JSON document against a JSON schema.
///
/// Returns every validation error message, or `Ok(())` when the document is valid.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Boolean form of [`validate`].
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

fn rule_set_schema() -> Result<Value, Vec<String>> {
    serde_json::from_str(RULE_SET_SCHEMA).map_err(|e| vec![format!("Invalid embedded schema: {}", e)])
}

/// Validate a rule-set document against the embedded schema.
pub fn validate_rule_set(data: &Value) -> Result<(), Vec<String>> {
    let schema = rule_set_schema()?;
    validate(&schema, data)
}

/// Quick check against the rule-set schema.
pub fn is_valid_rule_set(data: &Value) -> bool {
    rule_set_schema().is_ok_and(|schema| is_valid(&schema, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_rule_set() {
        let rules = json!({
            "version": "1.0",
            "match_rules": [
                { "source_column": "email", "target_column": "mail", "match_type": "exact" },
                { "source_column": "name", "target_column": "full_name", "match_type": "fuzzy", "threshold": 0.8 }
            ],
            "transform_rules": [
                {
                    "source_columns": ["first", "last"],
                    "target_column": "full",
                    "transform_type": "concatenate",
                    "parameters": { "separator": " " }
                }
            ],
            "options": { "threshold_policy": "per_rule", "fuzzy_scorer": "jaro_winkler" }
        });
        assert!(is_valid_rule_set(&rules));
        assert!(validate_rule_set(&rules).is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let rules = json!({
            "match_rules": [
                { "source_column": "a", "target_column": "b", "match_type": "fuzzy", "threshold": 1.5 }
            ]
        });
        let errors = validate_rule_set(&rules).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("1.5"));
    }

    #[test]
    fn test_missing_required_fields() {
        let rules = json!({ "transform_rules": [ { "target_column": "x" } ] });
        let errors = validate_rule_set(&rules).unwrap_err();
        assert!(!errors.is_empty());
        assert!(!is_valid_rule_set(&rules));
    }

    #[test]
    fn test_unknown_transform_type_passes_schema() {
        let rules = json!({
            "transform_rules": [
                { "source_columns": ["a"], "target_column": "b", "transform_type": "uppercase" }
            ]
        });
        assert!(is_valid_rule_set(&rules));
    }
}
