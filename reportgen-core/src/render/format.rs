//! Cell formatting for table columns.
//!
//! Formatting never fails a section: [`CellFormat::apply`] returns a
//! [`FormatError`] that the table renderer logs at debug level before
//! falling back to the raw value.

use crate::config::{ColumnConfig, ColumnType};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use std::fmt::Write as _;
use thiserror::Error;

/// Decimal places used when a numeric format has no fractional part.
pub const DEFAULT_DECIMAL_PLACES: usize = 2;

/// A recoverable, per-cell formatting failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// A numeric formatter received something that is not a number
    #[error("'{value}' is not numeric")]
    NotNumeric { value: String },

    /// A date formatter could not parse the value
    #[error("'{value}' is not a recognized date or timestamp")]
    UnparseableDate { value: String },

    /// The strftime pattern itself is invalid
    #[error("invalid date pattern '{pattern}'")]
    InvalidPattern { pattern: String },
}

/// Formatter selected for a declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellFormat {
    /// `"0,0"`: thousands-grouped integer
    Integer,
    /// `"$..."`: thousands-grouped, two decimal places, dollar sign
    Currency,
    /// Any other numeric format: thousands-grouped with fixed decimals
    Decimal { places: usize },
    /// strftime pattern applied to a parsed date or timestamp
    Date { pattern: String },
}

impl CellFormat {
    /// Picks the formatter for a column, if it has one.
    ///
    /// Only `number` columns and `date` columns with a `format` are
    /// formatted; everything else renders raw.
    pub fn for_column(column: &ColumnConfig) -> Option<Self> {
        match column.column_type {
            ColumnType::Number => Some(match column.format.as_deref() {
                Some("0,0") => CellFormat::Integer,
                Some(format) if format.starts_with('$') => CellFormat::Currency,
                other => CellFormat::Decimal {
                    places: decimal_places(other),
                },
            }),
            ColumnType::Date => column
                .format
                .as_ref()
                .map(|pattern| CellFormat::Date {
                    pattern: pattern.clone(),
                }),
            ColumnType::String | ColumnType::Boolean | ColumnType::Other => None,
        }
    }

    /// CSS class carried by cells this formatter produced.
    pub fn css_class(&self) -> &'static str {
        match self {
            CellFormat::Integer | CellFormat::Decimal { .. } => "number",
            CellFormat::Currency => "currency",
            CellFormat::Date { .. } => "date",
        }
    }

    /// Formats one value.
    ///
    /// # Errors
    /// Returns a [`FormatError`] when the value does not fit the formatter.
    pub fn apply(&self, value: &JsonValue) -> Result<String, FormatError> {
        match self {
            CellFormat::Integer => {
                if let Some(n) = value.as_i64() {
                    return Ok(group_thousands(&n.to_string()));
                }
                let n = numeric_value(value)?.round();
                // Normalizes -0 so small negatives render as "0"
                let n = if n == 0.0 { 0.0 } else { n };
                Ok(group_thousands(&format!("{:.0}", n)))
            }
            CellFormat::Currency => {
                let n = numeric_value(value)?;
                let text = group_thousands(&format!("{:.2}", n.abs()));
                if n < 0.0 && text.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
                    Ok(format!("-${}", text))
                } else {
                    Ok(format!("${}", text))
                }
            }
            CellFormat::Decimal { places } => {
                let n = numeric_value(value)?;
                Ok(group_thousands(&format!("{:.*}", *places, n)))
            }
            CellFormat::Date { pattern } => format_date(value, pattern),
        }
    }
}

/// Counts `0`/`#` after the decimal point; formats without one get the
/// default.
fn decimal_places(format: Option<&str>) -> usize {
    format
        .and_then(|format| format.split_once('.'))
        .map_or(DEFAULT_DECIMAL_PLACES, |(_, fraction)| {
            fraction
                .chars()
                .take_while(|c| matches!(c, '0' | '#'))
                .count()
        })
}

/// Reads a finite number from a JSON number or a numeric string.
fn numeric_value(value: &JsonValue) -> Result<f64, FormatError> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| FormatError::NotNumeric {
            value: raw_text(value),
        })
}

/// Inserts `,` every three digits of the integer part. Handles a leading
/// sign and an optional fractional part.
pub fn group_thousands(number: &str) -> String {
    let (sign, unsigned) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(number.len() + integer.len() / 3);
    grouped.push_str(sign);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

fn format_date(value: &JsonValue, pattern: &str) -> Result<String, FormatError> {
    let text = value.as_str().map(str::trim).ok_or_else(|| FormatError::UnparseableDate {
        value: raw_text(value),
    })?;
    let parsed = parse_timestamp(text).ok_or_else(|| FormatError::UnparseableDate {
        value: text.to_string(),
    })?;

    let mut out = String::new();
    write!(out, "{}", parsed.format(pattern)).map_err(|_| FormatError::InvalidPattern {
        pattern: pattern.to_string(),
    })?;
    Ok(out)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]`, `YYYY-MM-DDTHH:MM:SS[.fff]`
/// and `YYYY-MM-DD`.
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Renders a value without any formatting.
///
/// Strings as-is, numbers and booleans as JSON text, null as empty, arrays
/// and objects as compact JSON.
pub fn raw_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number(format: Option<&str>) -> CellFormat {
        let mut column = ColumnConfig::new("n", ColumnType::Number);
        column.format = format.map(str::to_string);
        CellFormat::for_column(&column).unwrap()
    }

    #[test]
    fn test_integer_grouping() {
        let format = number(Some("0,0"));
        assert_eq!(format.apply(&json!(1234567)).unwrap(), "1,234,567");
        assert_eq!(format.apply(&json!(-1234)).unwrap(), "-1,234");
        assert_eq!(format.apply(&json!(999)).unwrap(), "999");
        assert_eq!(format.apply(&json!(1234.6)).unwrap(), "1,235");
        assert_eq!(format.css_class(), "number");
    }

    #[test]
    fn test_integer_rounds_half_away_from_zero() {
        let format = number(Some("0,0"));
        assert_eq!(format.apply(&json!(2.5)).unwrap(), "3");
        assert_eq!(format.apply(&json!(-2.5)).unwrap(), "-3");
        assert_eq!(format.apply(&json!(-0.4)).unwrap(), "0");
        assert_eq!(format.apply(&json!("-0.0")).unwrap(), "0");
        assert_eq!(format.apply(&json!(1499.5)).unwrap(), "1,500");
    }

    #[test]
    fn test_currency() {
        let format = number(Some("$"));
        assert_eq!(format.apply(&json!(1234.5)).unwrap(), "$1,234.50");
        assert_eq!(format.apply(&json!(100)).unwrap(), "$100.00");
        assert_eq!(format.apply(&json!(-5)).unwrap(), "-$5.00");
        assert_eq!(format.apply(&json!(-0.001)).unwrap(), "$0.00");
        assert_eq!(number(Some("$0,0.00")), CellFormat::Currency);
        assert_eq!(format.css_class(), "currency");
    }

    #[test]
    fn test_decimal_places() {
        assert_eq!(number(None), CellFormat::Decimal { places: 2 });
        assert_eq!(number(Some("0,0.000")), CellFormat::Decimal { places: 3 });
        assert_eq!(number(Some("#,##0.#")), CellFormat::Decimal { places: 1 });
        assert_eq!(number(Some("0.")), CellFormat::Decimal { places: 0 });
        assert_eq!(number(Some("percent")), CellFormat::Decimal { places: 2 });

        let format = number(Some("0,0.000"));
        assert_eq!(format.apply(&json!(1234.5)).unwrap(), "1,234.500");
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        assert_eq!(number(Some("0,0")).apply(&json!(" 2500 ")).unwrap(), "2,500");
        assert_eq!(number(Some("$")).apply(&json!("19.9")).unwrap(), "$19.90");
    }

    #[test]
    fn test_non_numeric_is_error() {
        let err = number(Some("$")).apply(&json!("n/a")).unwrap_err();
        assert_eq!(
            err,
            FormatError::NotNumeric {
                value: "n/a".to_string()
            }
        );
        assert!(number(None).apply(&json!("NaN")).is_err());
        assert!(number(None).apply(&json!(true)).is_err());
    }

    #[test]
    fn test_date_formatting() {
        let mut column = ColumnConfig::new("d", ColumnType::Date);
        assert!(CellFormat::for_column(&column).is_none());

        column.format = Some("%d/%m/%Y".to_string());
        let format = CellFormat::for_column(&column).unwrap();
        assert_eq!(format.css_class(), "date");
        assert_eq!(format.apply(&json!("2024-03-05")).unwrap(), "05/03/2024");
        assert_eq!(
            format.apply(&json!("2024-03-05 14:30:00")).unwrap(),
            "05/03/2024"
        );
        assert_eq!(
            format.apply(&json!("2024-03-05T14:30:00+02:00")).unwrap(),
            "05/03/2024"
        );
        assert!(matches!(
            format.apply(&json!("yesterday")),
            Err(FormatError::UnparseableDate { .. })
        ));
    }

    #[test]
    fn test_date_with_fractional_seconds() {
        let format = CellFormat::Date {
            pattern: "%d/%m/%Y %H:%M".to_string(),
        };
        assert_eq!(
            format.apply(&json!("2024-03-05T14:30:00.123456")).unwrap(),
            "05/03/2024 14:30"
        );
        assert_eq!(
            format.apply(&json!("2024-03-05 14:30:00.5")).unwrap(),
            "05/03/2024 14:30"
        );
        assert_eq!(
            format.apply(&json!("2024-03-05T14:30:00")).unwrap(),
            "05/03/2024 14:30"
        );
    }

    #[test]
    fn test_invalid_date_pattern() {
        let format = CellFormat::Date {
            pattern: "%Q".to_string(),
        };
        assert!(matches!(
            format.apply(&json!("2024-03-05")),
            Err(FormatError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_raw_text() {
        assert_eq!(raw_text(&json!(null)), "");
        assert_eq!(raw_text(&json!("x")), "x");
        assert_eq!(raw_text(&json!(1.5)), "1.5");
        assert_eq!(raw_text(&json!(false)), "false");
        assert_eq!(raw_text(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("0"), "0");
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("-1234567.89"), "-1,234,567.89");
        assert_eq!(group_thousands("123456"), "123,456");
    }

    #[test]
    fn test_string_columns_are_not_formatted() {
        let column = ColumnConfig::new("s", ColumnType::String).with_format("0,0");
        assert!(CellFormat::for_column(&column).is_none());
    }
}
