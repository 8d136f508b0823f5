use serde_json::value::to_raw_value;
use serde_json::Value;
use tracing::trace;

use docimport_schema::{RawDocument, RawValue};

/// Remove null-valued and empty-array members from every object in the
/// document
///
/// Objects left empty by the removal stay in place. Numbers are re-encoded
/// from their original literal, so large integers survive unchanged.
pub fn cleanup_null_values(document: &RawValue) -> Result<RawDocument, serde_json::Error> {
    let mut value: Value = serde_json::from_str(document.get())?;
    strip(&mut value);
    to_raw_value(&value)
}

fn strip(value: &mut Value) {
    match value {
        Value::Object(members) => {
            members.retain(|name, member| {
                let keep = !matches!(member, Value::Null) && !matches!(member, Value::Array(a) if a.is_empty());
                if !keep {
                    trace!(name = name.as_str(), "removed empty value");
                }
                keep
            });
            members.values_mut().for_each(strip);
        }
        Value::Array(elements) => elements.iter_mut().for_each(strip),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(json: &str) -> String {
        let raw = RawValue::from_string(json.to_string()).unwrap();
        cleanup_null_values(&raw).unwrap().get().to_string()
    }

    #[test]
    fn test_removes_nulls_and_empty_arrays() {
        assert_eq!(clean(r#"{"a":null,"b":[],"c":1}"#), r#"{"c":1}"#);
    }

    #[test]
    fn test_recurses_into_nested_objects() {
        assert_eq!(
            clean(r#"{"o":{"x":null,"y":{"z":[]}},"k":"v"}"#),
            r#"{"k":"v","o":{"y":{}}}"#
        );
    }

    #[test]
    fn test_recurses_into_objects_inside_arrays() {
        assert_eq!(
            clean(r#"{"items":[{"a":null,"b":2},{"c":[]}]}"#),
            r#"{"items":[{"b":2},{}]}"#
        );
    }

    #[test]
    fn test_array_elements_are_kept() {
        assert_eq!(clean(r#"{"a":[null,1]}"#), r#"{"a":[null,1]}"#);
    }

    #[test]
    fn test_large_integers_survive() {
        assert_eq!(
            clean(r#"{"big":123456789012345678901234567890,"f":1.10,"n":null}"#),
            r#"{"big":123456789012345678901234567890,"f":1.10}"#
        );
    }

    #[test]
    fn test_non_object_document_passes_through() {
        let raw = RawValue::from_string("[1,2]".to_string()).unwrap();
        assert_eq!(cleanup_null_values(&raw).unwrap().get(), "[1,2]");
    }
}
