//! Cell-level conversions used by the transformer.
//!
//! Functions here never fail a whole rule: a cell that cannot be converted
//! yields `None` and the caller decides what to record.

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};

use crate::models::Value;

/// Layouts tried, in order, when a date rule has no `source_format`.
pub const DATE_PRESETS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%Y%m%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

// =============================================================================
// Dates
// =============================================================================

/// Parse a strftime pattern, rejecting unknown or truncated specifiers.
pub fn date_pattern(pattern: &str) -> Result<Vec<Item<'_>>, String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        Err(format!("invalid date pattern '{pattern}'"))
    } else {
        Ok(items)
    }
}

/// Read a cell as a date.
///
/// Date cells pass through. Text (or a number's string form) is parsed with
/// `source_format`, or with each of [`DATE_PRESETS`] when none is given.
/// Patterns without a time part yield midnight.
pub fn parse_date(value: &Value, source_format: Option<&str>) -> Option<NaiveDateTime> {
    let text = match value {
        Value::Missing => return None,
        Value::Date(d) => return Some(*d),
        other => other.to_string(),
    };
    let text = text.trim();

    match source_format {
        Some(pattern) => parse_with(text, pattern),
        None => DATE_PRESETS.iter().find_map(|pattern| parse_with(text, pattern)),
    }
}

fn parse_with(text: &str, pattern: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, pattern).ok().or_else(|| {
        NaiveDate::parse_from_str(text, pattern)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

/// Render a date with pre-parsed strftime items.
///
/// Fails when the pattern asks for something a naive date-time cannot
/// provide, such as a UTC offset.
pub fn render_date(date: &NaiveDateTime, items: &[Item<'_>]) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    write!(out, "{}", date.format_with_items(items.iter()))?;
    Ok(out)
}

// =============================================================================
// Numbers
// =============================================================================

/// Read a cell as a number. Text is trimmed first; dates never coerce.
pub fn coerce_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|x| !x.is_nan())
}

/// Round half to even to `decimals` fractional digits, so `0.125` becomes
/// `0.12` and `2.5` becomes `2.0`.
///
/// Negative `decimals` round to tens, hundreds and so on.
pub fn round_half_even(x: f64, decimals: i32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    if decimals >= 0 {
        let factor = 10f64.powi(decimals);
        let scaled = x * factor;
        if !scaled.is_finite() {
            return x;
        }
        scaled.round_ties_even() / factor
    } else {
        let factor = 10f64.powi(-decimals);
        if !factor.is_finite() {
            return 0.0;
        }
        (x / factor).round_ties_even() * factor
    }
}

/// Round a cell for `number_format`.
///
/// Integer cells stay integers; with negative `decimals` they are rounded to
/// tens, hundreds and so on. Everything else that coerces becomes a float.
pub fn round_number(value: &Value, decimals: i32) -> Option<Value> {
    match value {
        Value::Integer(i) if decimals >= 0 => Some(Value::Integer(*i)),
        Value::Integer(i) => {
            let rounded = round_half_even(*i as f64, decimals);
            if rounded.abs() < i64::MAX as f64 {
                Some(Value::Integer(rounded as i64))
            } else {
                Some(Value::Float(rounded))
            }
        }
        other => coerce_number(other).map(|x| Value::Float(round_half_even(x, decimals))),
    }
}

// =============================================================================
// Text
// =============================================================================

/// Join the string forms of `values`, rendering missing cells as `placeholder`.
pub fn join_values(values: &[&Value], separator: &str, placeholder: &str) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        match value {
            Value::Missing => out.push_str(placeholder),
            other => out.push_str(&other.to_string()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_date_pattern_validation() {
        assert!(date_pattern("%Y-%m-%d").is_ok());
        assert!(date_pattern("%Q").is_err());
        assert!(date_pattern("%").is_err());
    }

    #[test]
    fn test_parse_date_with_format() {
        let v = Value::text("2024-01-15");
        assert_eq!(parse_date(&v, Some("%Y-%m-%d")), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date(&v, Some("%d/%m/%Y")), None);
        assert_eq!(parse_date(&Value::text("not a date"), Some("%Y-%m-%d")), None);
        assert_eq!(parse_date(&Value::Missing, None), None);
    }

    #[test]
    fn test_parse_date_presets() {
        assert_eq!(parse_date(&Value::text("2024-01-15"), None), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date(&Value::text(" 2024/03/02 "), None), Some(ymd(2024, 3, 2)));
        assert_eq!(parse_date(&Value::Integer(20240115), None), Some(ymd(2024, 1, 15)));
        // month first, as in US-style dates
        assert_eq!(parse_date(&Value::text("02/03/2024"), None), Some(ymd(2024, 2, 3)));
        let with_time = parse_date(&Value::text("2024-01-15 08:30:00"), None).unwrap();
        assert_eq!(with_time.format("%H:%M").to_string(), "08:30");
    }

    #[test]
    fn test_render_date() {
        let items = date_pattern("%m/%d/%Y").unwrap();
        assert_eq!(render_date(&ymd(2024, 1, 15), &items).unwrap(), "01/15/2024");

        let offset = date_pattern("%z").unwrap();
        assert!(render_date(&ymd(2024, 1, 15), &offset).is_err());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_half_even(12.34567, 2), 12.35);
        assert_eq!(round_half_even(2.5, 0), 2.0);
        assert_eq!(round_half_even(3.5, 0), 4.0);
        assert_eq!(round_half_even(-2.5, 0), -2.0);
        assert_eq!(round_half_even(0.125, 2), 0.12);
        assert_eq!(round_half_even(1250.0, -2), 1200.0);
        assert_eq!(round_half_even(1234.5, -1), 1230.0);
    }

    #[test]
    fn test_round_number_keeps_integers() {
        assert_eq!(round_number(&Value::Integer(5), 2), Some(Value::Integer(5)));
        assert_eq!(round_number(&Value::Integer(1250), -2), Some(Value::Integer(1200)));
        assert_eq!(round_number(&Value::Integer(1351), -2), Some(Value::Integer(1400)));
        assert_eq!(round_number(&Value::text(" 2.5 "), 0), Some(Value::Float(2.0)));
        assert_eq!(round_number(&Value::Float(0.125), 2), Some(Value::Float(0.12)));
        assert_eq!(round_number(&Value::text("abc"), 2), None);
        assert_eq!(round_number(&Value::Missing, 2), None);
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&Value::text(" 12.5 ")), Some(12.5));
        assert_eq!(coerce_number(&Value::Integer(3)), Some(3.0));
        assert_eq!(coerce_number(&Value::text("abc")), None);
        assert_eq!(coerce_number(&Value::Missing), None);
    }

    #[test]
    fn test_join_values() {
        let a = Value::text("Jane");
        let b = Value::Missing;
        let c = Value::Integer(7);
        assert_eq!(join_values(&[&a, &b, &c], "-", "nan"), "Jane-nan-7");
        assert_eq!(join_values(&[&a, &b], " ", ""), "Jane ");
    }
}
