//! Type translation: one JSON value to a (type, format) pair

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::error::SchemaError;
use crate::types::{Field, FieldType, Format};

/// Standard padded alphabet; non-zero trailing bits are tolerated.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Content sniffing switches
///
/// A disabled sniffer still fires when the field already recorded at the same
/// path carries that format, so an existing narrowing is never lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Detection {
    pub times: bool,
    pub uuids: bool,
    pub byte_arrays: bool,
    pub integers: bool,
}

impl Default for Detection {
    fn default() -> Self {
        Self {
            times: true,
            uuids: true,
            byte_arrays: true,
            integers: true,
        }
    }
}

/// Classify a decoded JSON value
///
/// `existing` is the field already recorded at the same path, if any. `null`
/// is never translated; callers skip it.
pub fn translate_type(
    value: &Value,
    existing: Option<&Field>,
    detection: &Detection,
) -> Result<(FieldType, Format), SchemaError> {
    match value {
        Value::Bool(_) => Ok((FieldType::Boolean, Format::None)),
        Value::Number(n) => translate_number(n, existing, detection),
        Value::String(s) => Ok((FieldType::String, string_format(s, existing, detection))),
        Value::Array(_) => Ok((FieldType::Array, Format::None)),
        Value::Object(_) => Ok((FieldType::Object, Format::None)),
        Value::Null => Err(SchemaError::UnsupportedType { kind: "null" }),
    }
}

fn translate_number(
    n: &Number,
    existing: Option<&Field>,
    detection: &Detection,
) -> Result<(FieldType, Format), SchemaError> {
    let literal = n.to_string();

    let integers = detection.integers || existing.is_some_and(|f| f.field_type == FieldType::Integer);
    if integers && literal.parse::<i64>().is_ok() {
        return Ok((FieldType::Integer, Format::None));
    }

    match literal.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok((FieldType::Number, Format::None)),
        _ => Err(SchemaError::InvalidNumber(literal)),
    }
}

fn narrows(enabled: bool, existing: Option<&Field>, format: Format) -> bool {
    enabled || existing.is_some_and(|f| f.format == format)
}

fn string_format(s: &str, existing: Option<&Field>, detection: &Detection) -> Format {
    if is_date_time(s) && narrows(detection.times, existing, Format::DateTime) {
        Format::DateTime
    } else if is_uuid(s) && narrows(detection.uuids, existing, Format::Uuid) {
        Format::Uuid
    } else if is_base64(s) && narrows(detection.byte_arrays, existing, Format::Byte) {
        Format::Byte
    } else {
        Format::None
    }
}

/// RFC 3339 timestamp, fractional seconds allowed
pub fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

pub fn is_uuid(s: &str) -> bool {
    Uuid::parse_str(s).is_ok()
}

/// Non-empty, padded standard base64
pub fn is_base64(s: &str) -> bool {
    !s.is_empty() && STANDARD_LENIENT.decode(s).is_ok()
}

/// Whether `s` is a valid instance of `format`
pub fn matches_format(s: &str, format: Format) -> bool {
    match format {
        Format::None => true,
        Format::Byte => is_base64(s),
        Format::DateTime => is_date_time(s),
        Format::Uuid => is_uuid(s),
    }
}
