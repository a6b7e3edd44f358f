//! Contract validation primitives.
//!
//! Required fields fail loudly with a [`InspectorError::Contract`] naming the
//! offending path. Optional and loosely-typed fields are coerced
//! permissively and never fail.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{InspectorError, Result};
use crate::types::ParamKind;

/// A decoded JSON object.
pub type Record = Map<String, Value>;

/// Naive layouts tried after RFC 3339. Interpreted as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

// =============================================================================
// Body Decoding
// =============================================================================

/// Decode a response body into JSON.
///
/// # Errors
///
/// Returns a parse error when `body` is not JSON. If the body looks like an
/// HTML page the message says so, since that usually means the base address
/// points at something other than the inspector backend.
pub fn decode_json(body: &str, label: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|err| {
        let message = if looks_like_html(body) {
            format!(
                "{label}: expected JSON but received an HTML page (check that the base address points at the inspector backend)"
            )
        } else {
            format!("{label}: body is not valid JSON ({err})")
        };
        InspectorError::Parse { message }
    })
}

/// Whether `body` starts like an HTML document.
#[must_use]
pub fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(16).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

// =============================================================================
// Shape Checks
// =============================================================================

/// Extend a path with a field name.
#[must_use]
pub fn field_path(path: &str, field: &str) -> String {
    format!("{path}.{field}")
}

/// Extend a path with an array index.
#[must_use]
pub fn index_path(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

/// Require `value` to be a JSON object.
///
/// # Errors
///
/// Returns a contract error at `path` otherwise.
pub fn require_record<'a>(value: &'a Value, path: &str) -> Result<&'a Record> {
    value.as_object().ok_or_else(|| {
        InspectorError::contract(path, format!("expected an object, got {}", type_name(value)))
    })
}

/// Require `value` to be a JSON array.
///
/// # Errors
///
/// Returns a contract error at `path` otherwise.
pub fn require_array<'a>(value: &'a Value, path: &str) -> Result<&'a [Value]> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| {
            InspectorError::contract(path, format!("expected an array, got {}", type_name(value)))
        })
}

/// Require `record[field]` to be a non-blank string. Returns it trimmed.
///
/// # Errors
///
/// Returns a contract error at `path.field` if the field is missing, not a
/// string, or blank.
pub fn require_string(record: &Record, field: &str, path: &str) -> Result<String> {
    match record.get(field) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(Value::String(_)) => Err(InspectorError::contract(
            field_path(path, field),
            "expected a non-empty string",
        )),
        Some(other) => Err(InspectorError::contract(
            field_path(path, field),
            format!("expected a non-empty string, got {}", type_name(other)),
        )),
        None => Err(InspectorError::contract(
            field_path(path, field),
            "required field is missing",
        )),
    }
}

/// Validate every element of an array with `parse`, extending the path by index.
///
/// # Errors
///
/// Returns the first element error, or a contract error if `value` is not an array.
pub fn parse_each<T>(
    value: &Value,
    path: &str,
    mut parse: impl FnMut(&Value, &str) -> Result<T>,
) -> Result<Vec<T>> {
    require_array(value, path)?
        .iter()
        .enumerate()
        .map(|(index, element)| parse(element, &index_path(path, index)))
        .collect()
}

/// Like [`parse_each`] for an optional field: absent or null yields an empty list.
///
/// # Errors
///
/// Returns a contract error if the field is present but not an array, or the
/// first element error.
pub fn parse_optional_each<T>(
    record: &Record,
    field: &str,
    path: &str,
    parse: impl FnMut(&Value, &str) -> Result<T>,
) -> Result<Vec<T>> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => parse_each(value, &field_path(path, field), parse),
    }
}

// =============================================================================
// Permissive Coercions
// =============================================================================

/// Non-blank string field, or `None`.
#[must_use]
pub fn optional_string(record: &Record, field: &str) -> Option<String> {
    match record.get(field) {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        _ => None,
    }
}

/// String field as-is, or empty.
#[must_use]
pub fn string_or_empty(record: &Record, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    }
}

/// Field rendered as text: strings verbatim, other non-null values as compact JSON.
#[must_use]
pub fn optional_text(record: &Record, field: &str) -> Option<String> {
    match record.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Coerce to an integer: finite numbers truncate toward zero, decimal strings
/// are parsed, everything else is 0.
#[must_use]
pub fn coerce_number(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_else(|| truncate(n.as_f64())),
        Some(Value::String(text)) => truncate(text.trim().parse::<f64>().ok()),
        _ => 0,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(value: Option<f64>) -> i64 {
    match value {
        Some(float) if float.is_finite() => float.trunc() as i64,
        _ => 0,
    }
}

/// `Some(coerce_number(..))` when the field is present and non-null.
#[must_use]
pub fn optional_number(record: &Record, field: &str) -> Option<i64> {
    match record.get(field) {
        None | Some(Value::Null) => None,
        value => Some(coerce_number(value)),
    }
}

/// True only for the literal JSON `true`.
#[must_use]
pub fn coerce_bool(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

/// Parse an ISO-like timestamp. Blank or unparseable input yields `None`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn coerce_date(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(text) => parse_timestamp(text),
        Value::Number(n) => n
            .as_f64()
            .filter(|millis| millis.is_finite())
            .and_then(|millis| DateTime::from_timestamp_millis(millis.trunc() as i64)),
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// =============================================================================
// Parameter Kinds
// =============================================================================

/// Wire representations of a parameter kind across protocol revisions.
enum KindRepr<'a> {
    Code(i64),
    Name(&'a str),
    Missing,
}

impl<'a> KindRepr<'a> {
    #[allow(clippy::cast_possible_truncation)]
    fn read(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map_or(Self::Missing, Self::Code),
            Some(Value::String(name)) => Self::Name(name),
            _ => Self::Missing,
        }
    }
}

/// Decode a parameter kind from either an integer code or a type name.
#[must_use]
pub fn decode_param_kind(value: Option<&Value>) -> ParamKind {
    match KindRepr::read(value) {
        KindRepr::Code(code) => ParamKind::from_code(code),
        KindRepr::Name(name) => ParamKind::from_name(name),
        KindRepr::Missing => ParamKind::Unknown,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
