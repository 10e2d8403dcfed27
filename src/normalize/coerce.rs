//! Value-coercion helpers shared by every composer.
//!
//! All functions are total: they inspect a [`serde_json::Value`] and either
//! produce a well-typed value or `None`.

use std::borrow::Cow;

use serde_json::{Map, Value};
use time::{Date, Month};

/// Object view of a value. Arrays and scalars are not records.
#[must_use]
pub fn as_record(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object()
}

/// The object elements of an array value; anything else yields an empty list.
#[must_use]
pub fn record_array(value: &Value) -> Vec<&Map<String, Value>> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

/// Finite number from a native number or a numeric string.
///
/// Strings may carry thousands separators (`"1,234.5"`) and surrounding
/// whitespace. Booleans, objects, arrays and `null` are rejected.
#[must_use]
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let normalized = s.replace(',', "");
            let normalized = normalized.trim();
            if normalized.is_empty() {
                return None;
            }
            normalized.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Integral number, accepting the same inputs as [`coerce_number`].
#[must_use]
pub fn coerce_i64(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    coerce_number(value)
        .filter(|v| v.fract() == 0.0 && v.abs() < 9.0e15)
        .map(|v| v as i64)
}

/// Trimmed string slice with at least one non-whitespace character.
#[must_use]
pub fn non_empty_str(value: &Value) -> Option<&str> {
    let trimmed = value.as_str()?.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Owned variant of [`non_empty_str`], usable as a probe guard.
#[must_use]
pub fn coerce_non_empty_string(value: &Value) -> Option<String> {
    non_empty_str(value).map(str::to_owned)
}

/// Parse a value that may itself be JSON-encoded text.
///
/// Falls back to the original value when it is not a string or does not parse.
#[must_use]
pub fn try_parse_json(value: &Value) -> Cow<'_, Value> {
    let Some(text) = value.as_str() else {
        return Cow::Borrowed(value);
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Cow::Borrowed(value);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(parsed) => Cow::Owned(parsed),
        Err(_) => Cow::Borrowed(value),
    }
}

/// Map a probability to the 0-100 scale.
///
/// Values in `[0, 1]` are read as fractions; anything above is taken as
/// already being a percentage. A genuine "0.5%" is therefore read as 50%.
#[must_use]
pub fn normalize_percent(value: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    if (0.0..=1.0).contains(&value) {
        Some(value * 100.0)
    } else {
        Some(value)
    }
}

/// Parse an 8-digit `YYYYMMDD` date.
#[must_use]
pub fn parse_yyyymmdd(value: &str) -> Option<Date> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = value[0..4].parse().ok()?;
    let month: u8 = value[4..6].parse().ok()?;
    let day: u8 = value[6..8].parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

/// Format a date as `YYYYMMDD`.
#[must_use]
pub fn format_yyyymmdd(date: Date) -> String {
    format!(
        "{:04}{:02}{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}
