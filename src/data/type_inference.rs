//! Type coercion shared by the schema inferrer and the table loader
//!
//! A raw cell is coerced against a target type and yields one of three outcomes:
//! a typed value, null, or a failure that keeps the original text so the caller
//! can decide what to do with it.

use crate::data::datatable::{DataType, DataValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Optional sign, digits, no leading zeros (except a lone 0)
static INTEGER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(0|[1-9]\d*)$").unwrap());

/// Optional sign, digits with an optional fraction, optional exponent.
/// No thousands separators, no inf/nan, no whitespace.
static FLOAT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?((0|[1-9]\d*)(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap()
});

/// Vocabulary and formats used for coercion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoercionOptions {
    /// Words read as boolean true, compared case-insensitively
    pub true_values: Vec<String>,

    /// Words read as boolean false, compared case-insensitively
    pub false_values: Vec<String>,

    /// chrono format strings tried in order after RFC 3339.
    /// Each one is tried as a date-time first, then as a plain date.
    pub datetime_formats: Vec<String>,
}

impl Default for CoercionOptions {
    fn default() -> Self {
        Self {
            true_values: vec!["true".to_string()],
            false_values: vec!["false".to_string()],
            datetime_formats: vec![
                "%Y-%m-%d %H:%M:%S%.f".to_string(),
                "%Y-%m-%dT%H:%M:%S%.f".to_string(),
                "%Y-%m-%d %H:%M".to_string(),
                "%Y-%m-%d".to_string(),
                "%Y/%m/%d %H:%M:%S".to_string(),
                "%Y/%m/%d".to_string(),
                "%m/%d/%Y %H:%M:%S".to_string(),
                "%m/%d/%Y".to_string(),
                "%d-%m-%Y".to_string(),
            ],
        }
    }
}

/// A value that could not be coerced to the column type
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionFailure {
    pub original: String,
    pub target: DataType,
}

impl fmt::Display for CoercionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid {}", self.original, self.target)
    }
}

/// Outcome of coercing one raw cell
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Value(DataValue),
    Null,
    Failed(CoercionFailure),
}

impl Coerced {
    pub fn is_failure(&self) -> bool {
        matches!(self, Coerced::Failed(_))
    }

    /// Collapse to a cell value: failures become null
    pub fn into_value(self) -> DataValue {
        match self {
            Coerced::Value(value) => value,
            Coerced::Null | Coerced::Failed(_) => DataValue::Null,
        }
    }
}

/// Converts raw text into typed cells under a fixed vocabulary
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    true_values: Vec<String>,
    false_values: Vec<String>,
    datetime_formats: Vec<String>,
}

impl Default for TypeCoercer {
    fn default() -> Self {
        Self::new(&CoercionOptions::default())
    }
}

impl TypeCoercer {
    pub fn new(options: &CoercionOptions) -> Self {
        let lower = |values: &[String]| -> Vec<String> {
            values.iter().map(|v| v.trim().to_lowercase()).collect()
        };

        Self {
            true_values: lower(&options.true_values),
            false_values: lower(&options.false_values),
            datetime_formats: options.datetime_formats.clone(),
        }
    }

    /// Coerce a raw cell to the target type
    pub fn coerce(&self, raw: &str, target: DataType) -> Coerced {
        if raw.is_empty() {
            return Coerced::Null;
        }

        if target == DataType::Text {
            return Coerced::Value(DataValue::Text(raw.to_string()));
        }

        let value = raw.trim();
        if value.is_empty() {
            return Coerced::Null;
        }

        let parsed = match target {
            DataType::Boolean => self.parse_boolean(value).map(DataValue::Boolean),
            DataType::Integer => parse_integer(value).map(DataValue::Integer),
            DataType::Float => parse_float(value).map(DataValue::Float),
            DataType::DateTime => self.parse_datetime(value).map(DataValue::DateTime),
            DataType::Text => unreachable!("text handled above"),
        };

        match parsed {
            Some(value) => Coerced::Value(value),
            None => Coerced::Failed(CoercionFailure {
                original: raw.to_string(),
                target,
            }),
        }
    }

    /// Check if a value can be coerced to a specific type (nulls always can)
    pub fn can_coerce_to(&self, raw: &str, target: DataType) -> bool {
        !self.coerce(raw, target).is_failure()
    }

    /// Most specific type a single value fits, `None` for null
    pub fn classify(&self, raw: &str) -> Option<DataType> {
        if raw.trim().is_empty() {
            return None;
        }

        DataType::LADDER
            .into_iter()
            .find(|data_type| self.can_coerce_to(raw, *data_type))
    }

    fn parse_boolean(&self, value: &str) -> Option<bool> {
        let lower = value.to_lowercase();
        if lower == "true" || self.true_values.contains(&lower) {
            Some(true)
        } else if lower == "false" || self.false_values.contains(&lower) {
            Some(false)
        } else {
            None
        }
    }

    fn parse_datetime(&self, value: &str) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.naive_utc());
        }

        for format in &self.datetime_formats {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
                return Some(dt);
            }
            if let Ok(date) = NaiveDate::parse_from_str(value, format) {
                return date.and_hms_opt(0, 0, 0);
            }
        }

        None
    }
}

fn parse_integer(value: &str) -> Option<i64> {
    if !INTEGER_PATTERN.is_match(value) {
        return None;
    }
    value.parse::<i64>().ok()
}

fn parse_float(value: &str) -> Option<f64> {
    if !FLOAT_PATTERN.is_match(value) {
        return None;
    }
    value.parse::<f64>().ok().filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coercer() -> TypeCoercer {
        TypeCoercer::default()
    }

    #[test]
    fn test_basic_classification() {
        let c = coercer();
        assert_eq!(c.classify("123"), Some(DataType::Integer));
        assert_eq!(c.classify("-42"), Some(DataType::Integer));
        assert_eq!(c.classify("123.45"), Some(DataType::Float));
        assert_eq!(c.classify("1.5e3"), Some(DataType::Float));
        assert_eq!(c.classify("true"), Some(DataType::Boolean));
        assert_eq!(c.classify("FALSE"), Some(DataType::Boolean));
        assert_eq!(c.classify("hello"), Some(DataType::Text));
        assert_eq!(c.classify(""), None);
        assert_eq!(c.classify("   "), None);
    }

    #[test]
    fn test_empty_is_null_for_every_type() {
        let c = coercer();
        for data_type in DataType::LADDER {
            assert_eq!(c.coerce("", data_type), Coerced::Null);
        }
    }

    #[test]
    fn test_numeric_rejects_thousands_separators() {
        let c = coercer();
        assert!(c.coerce("1,000", DataType::Integer).is_failure());
        assert!(c.coerce("1,000.50", DataType::Float).is_failure());
        assert!(c.coerce("1 000", DataType::Integer).is_failure());
        assert_eq!(c.classify("1,000"), Some(DataType::Text));
    }

    #[test]
    fn test_numeric_rejects_special_values_and_leading_zeros() {
        let c = coercer();
        assert!(c.coerce("inf", DataType::Float).is_failure());
        assert!(c.coerce("NaN", DataType::Float).is_failure());
        assert!(c.coerce("007", DataType::Integer).is_failure());
        assert!(c.coerce("007", DataType::Float).is_failure());
        assert_eq!(
            c.coerce("0", DataType::Integer),
            Coerced::Value(DataValue::Integer(0))
        );
        assert_eq!(
            c.coerce("0.25", DataType::Float),
            Coerced::Value(DataValue::Float(0.25))
        );
    }

    #[test]
    fn test_numeric_trims_surrounding_whitespace() {
        let c = coercer();
        assert_eq!(
            c.coerce(" 42 ", DataType::Integer),
            Coerced::Value(DataValue::Integer(42))
        );
        assert_eq!(
            c.coerce("+3.5", DataType::Float),
            Coerced::Value(DataValue::Float(3.5))
        );
    }

    #[test]
    fn test_text_is_verbatim() {
        let c = coercer();
        assert_eq!(
            c.coerce("  padded ", DataType::Text),
            Coerced::Value(DataValue::Text("  padded ".to_string()))
        );
    }

    #[test]
    fn test_failure_keeps_original_text() {
        let c = coercer();
        match c.coerce("abc", DataType::Integer) {
            Coerced::Failed(failure) => {
                assert_eq!(failure.original, "abc");
                assert_eq!(failure.target, DataType::Integer);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_boolean_vocabulary_is_configurable() {
        let default = coercer();
        assert!(default.coerce("1", DataType::Boolean).is_failure());
        assert!(default.coerce("yes", DataType::Boolean).is_failure());

        let options = CoercionOptions {
            true_values: vec!["yes".to_string(), "1".to_string()],
            false_values: vec!["no".to_string(), "0".to_string()],
            ..CoercionOptions::default()
        };
        let c = TypeCoercer::new(&options);
        assert_eq!(
            c.coerce("YES", DataType::Boolean),
            Coerced::Value(DataValue::Boolean(true))
        );
        assert_eq!(
            c.coerce("0", DataType::Boolean),
            Coerced::Value(DataValue::Boolean(false))
        );
        // canonical words are always understood
        assert_eq!(
            c.coerce("true", DataType::Boolean),
            Coerced::Value(DataValue::Boolean(true))
        );
    }

    #[test]
    fn test_datetime_detection() {
        let c = coercer();
        assert_eq!(c.classify("2024-01-15"), Some(DataType::DateTime));
        assert_eq!(c.classify("01/15/2024"), Some(DataType::DateTime));
        assert_eq!(c.classify("15-01-2024"), Some(DataType::DateTime));
        assert_eq!(c.classify("2024-01-15T10:30:00"), Some(DataType::DateTime));
        assert_eq!(c.classify("2024-01-15T10:30:00Z"), Some(DataType::DateTime));
        assert_eq!(c.classify("2024-01-15 10:30:00"), Some(DataType::DateTime));
    }

    #[test]
    fn test_id_strings_not_detected_as_datetime() {
        let c = coercer();
        assert_eq!(c.classify("BQ-81198596"), Some(DataType::Text));
        assert_eq!(c.classify("ORDER-2024-001"), Some(DataType::Text));
        assert_eq!(c.classify("2024-ABC-123"), Some(DataType::Text));
    }

    #[test]
    fn test_invalid_dates_not_detected() {
        let c = coercer();
        assert_eq!(c.classify("2024-13-01"), Some(DataType::Text));
        assert_eq!(c.classify("2024-00-15"), Some(DataType::Text));
        assert_eq!(c.classify("2024-01-32"), Some(DataType::Text));
    }

    #[test]
    fn test_first_matching_format_wins() {
        let c = coercer();
        // 03/04/2024 matches %m/%d/%Y before any day-first format
        match c.coerce("03/04/2024", DataType::DateTime) {
            Coerced::Value(DataValue::DateTime(dt)) => {
                assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-03-04");
            }
            other => panic!("expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn test_rfc3339_is_normalized_to_utc() {
        let c = coercer();
        match c.coerce("2024-01-15T10:30:00+02:00", DataType::DateTime) {
            Coerced::Value(DataValue::DateTime(dt)) => {
                assert_eq!(dt.format("%H:%M").to_string(), "08:30");
            }
            other => panic!("expected datetime, got {:?}", other),
        }
    }
}
