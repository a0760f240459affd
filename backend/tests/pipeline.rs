//! End-to-end runs over files on disk.

use std::fs;
use std::path::Path;

use tabmatch::{
    match_report, match_tables, run_files, transform, Column, MatchOptions, MatchRule, PipelineError, RuleSetError,
    Table, TransformRule, TransformType, Value,
};
use tempfile::tempdir;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

const CUSTOMERS: &str = "\
id;name;email;signup;balance
1;Acme Corp;sales@acme.com;2024-01-15;1234.567
2;Globex;info@globex.com;2023-12-01;n/a
3;Initech;hi@initech.com;not a date;10
";

const CRM: &str = "\
contact_email,full_name,owner
SALES@ACME.COM,ACME Corporation,Jane
info@globex.com,Globex Inc,Bob
";

const RULES: &str = r#"{
  "version": "1.0",
  "description": "customers to crm",
  "match_rules": [
    { "source_column": "email", "target_column": "contact_email", "match_type": "exact" }
  ],
  "transform_rules": [
    {
      "source_columns": ["signup"],
      "target_column": "signup_us",
      "transform_type": "date_format",
      "parameters": { "source_format": "%Y-%m-%d", "target_format": "%m/%d/%Y" }
    },
    {
      "source_columns": ["balance"],
      "target_column": "balance",
      "transform_type": "number_format",
      "parameters": { "decimals": 1 }
    },
    {
      "source_columns": ["name", "owner"],
      "target_column": "label",
      "transform_type": "concatenate",
      "parameters": { "separator": " / " }
    },
    {
      "source_columns": ["name"],
      "target_column": "shout",
      "transform_type": "uppercase"
    }
  ]
}"#;

#[test]
fn test_run_files_end_to_end() {
    let dir = tempdir().unwrap();
    let source = write(dir.path(), "customers.csv", CUSTOMERS);
    let target = write(dir.path(), "crm.csv", CRM);
    let rules = write(dir.path(), "rules.json", RULES);

    let output = run_files(&source, &target, &rules).unwrap();
    let table = &output.table;

    assert_eq!(output.matched_rows(), 2);
    assert_eq!(output.unmatched, vec![2]);
    assert_eq!(
        table.column_names(),
        vec!["id", "name", "email", "signup", "balance", "contact_email", "full_name", "owner", "signup_us", "label"]
    );
    assert_eq!(table.cell(0, "signup_us"), Some(&Value::text("01/15/2024")));
    assert_eq!(table.cell(0, "balance"), Some(&Value::Float(1234.6)));
    assert_eq!(table.cell(1, "balance"), Some(&Value::Missing));
    assert_eq!(table.cell(1, "label"), Some(&Value::text("Globex / Bob")));

    // unknown transform type reported, not applied
    assert_eq!(output.transform_errors.len(), 1);
    assert_eq!(output.transform_errors[0].rule_index, 3);
    assert!(!table.has_column("shout"));

    let info = output.source_info.unwrap();
    assert_eq!(info.delimiter, ';');
    assert_eq!(info.row_count, 3);
}

#[test]
fn test_run_files_rejects_invalid_rules() {
    let dir = tempdir().unwrap();
    let source = write(dir.path(), "customers.csv", CUSTOMERS);
    let target = write(dir.path(), "crm.csv", CRM);
    let rules = write(
        dir.path(),
        "rules.json",
        r#"{"match_rules": [{"source_column": "email", "target_column": "contact_email", "match_type": "exact", "threshold": 2}]}"#,
    );

    let err = run_files(&source, &target, &rules).unwrap_err();
    assert!(matches!(err, PipelineError::RuleSet(RuleSetError::Invalid { .. })));
}

#[test]
fn test_export_round_trip_through_csv() {
    let dir = tempdir().unwrap();
    let source = write(dir.path(), "customers.csv", CUSTOMERS);
    let target = write(dir.path(), "crm.csv", CRM);
    let rules = write(dir.path(), "rules.json", RULES);

    let output = run_files(&source, &target, &rules).unwrap();
    let out_path = dir.path().join("out.csv");
    tabmatch::export_table(&output.table, &out_path).unwrap();

    let reparsed = tabmatch::parse_csv_file_auto(&out_path).unwrap();
    assert_eq!(reparsed.headers, output.table.column_names());
    assert_eq!(reparsed.table.row_count(), 2);
    assert_eq!(reparsed.table.cell(1, "balance"), Some(&Value::Missing));
}

// =============================================================================
// Engine properties
// =============================================================================

fn people(names: &[&str]) -> Table {
    let ids: Vec<Value> = (0..names.len() as i64).map(Value::Integer).collect();
    Table::new(vec![Column::new("id", ids), Column::from_strs("name", names)]).unwrap()
}

#[test]
fn test_output_never_exceeds_source_rows() {
    let source = people(&["Ann", "Ben", "Cy", "Ann"]);
    let target = people(&["ann", "ann", "ben"]);
    let rules = vec![MatchRule::fuzzy("name", "name", 0.5)];

    let report = match_report(&source, &target, &rules, &MatchOptions::default()).unwrap();
    assert!(report.table.row_count() <= source.row_count());
    assert_eq!(report.matches.len() + report.unmatched.len(), source.row_count());
    // several source rows may share a target
    assert_eq!(report.matches[0].target_row, report.matches[2].target_row);
}

#[test]
fn test_matching_is_deterministic() {
    let source = people(&["Jon Smith", "Jane Doe", "J. Smith"]);
    let target = people(&["John Smith", "Jane Do", "Jon Smyth"]);
    let rules = vec![MatchRule::fuzzy("name", "name", 0.6)];

    let first = match_tables(&source, &target, &rules, &MatchOptions::default()).unwrap();
    let second = match_tables(&source, &target, &rules, &MatchOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_transform_is_deterministic() {
    let table = Table::new(vec![
        Column::from_strs("first", &["Jane", "Bob", "Cy"]),
        Column::new("last", vec![Value::text("Doe"), Value::Missing, Value::text("Ng")]),
        Column::from_strs("signup", &["2024-01-15", "garbage", "03/04/2023"]),
        Column::new("balance", vec![Value::Float(0.125), Value::text("n/a"), Value::Integer(7)]),
    ])
    .unwrap();
    let rules = vec![
        TransformRule::date_format("signup", "signup_iso", "%Y-%m-%d", "%d.%m.%Y"),
        TransformRule::new(vec!["signup".into()], "year", TransformType::DateFormat)
            .with_parameter("target_format", "%Y"),
        TransformRule::number_format("balance", "balance", 2),
        TransformRule::concatenate(&["first", "last"], "full", " "),
        TransformRule::new(vec!["first".into()], "shout", TransformType::Other("uppercase".into())),
    ];

    let first = transform(&table, &rules).unwrap();
    let second = transform(&table, &rules).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.errors.len(), 1);
    assert!(!first.warnings.is_empty());
    assert_eq!(first.table.cell(2, "year"), Some(&Value::text("2023")));
}

#[test]
fn test_output_preserves_source_order() {
    let source = people(&["c", "a", "b"]);
    let target = people(&["a", "b", "c"]);
    let report = match_report(&source, &target, &[MatchRule::exact("name", "name")], &MatchOptions::default()).unwrap();

    let rows: Vec<usize> = report.matches.iter().map(|m| m.source_row).collect();
    assert_eq!(rows, vec![0, 1, 2]);
    // "id" is shared, so it carries the target's id
    assert_eq!(report.table.cell(0, "id"), Some(&Value::Integer(2)));
}

#[test]
fn test_transform_keeps_row_count_and_columns() {
    let table = people(&["Ann", "Ben"]);
    let rules = vec![
        TransformRule::concatenate(&["id", "name"], "key", "-"),
        TransformRule::number_format("name", "name_num", 0),
    ];
    let outcome = transform(&table, &rules).unwrap();

    assert_eq!(outcome.table.row_count(), table.row_count());
    assert_eq!(&outcome.table.column_names()[..2], &["id", "name"]);
    assert_eq!(outcome.table.cell(1, "key"), Some(&Value::text("1-Ben")));
    assert_eq!(outcome.warnings.len(), 2);
}
