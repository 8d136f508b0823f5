//! Type widening for repeated observations of one field
//!
//! Widening is one-directional: integer to number, and a sniffed string format
//! (byte, uuid, date-time) to plain string. A plain string is never narrowed
//! back to a format.

use tracing::debug;

use crate::error::SchemaError;
use crate::types::{FieldType, Format};

/// Merge the recorded `old` shape of field `name` with a newly observed `new`
/// shape.
pub fn extend_type(
    name: &str,
    old: (FieldType, Format),
    new: (FieldType, Format),
) -> Result<(FieldType, Format), SchemaError> {
    match (old, new) {
        ((FieldType::Integer, _), (FieldType::Number, new_format)) => {
            return Ok((FieldType::Number, new_format));
        }
        ((FieldType::Number, _), (FieldType::Integer, _)) => return Ok(old),
        ((FieldType::String, old_format), (FieldType::String, new_format)) if old_format != new_format => {
            if new_format.is_none() {
                return Ok(new);
            }
            if old_format.is_none() {
                return Ok(old);
            }
        }
        _ => {}
    }

    if old == new {
        return Ok(new);
    }

    debug!(
        field_name = name,
        old_type = %old.0,
        old_format = %old.1,
        new_type = %new.0,
        new_format = %new.1,
        "incompatible schema"
    );

    Err(SchemaError::incompatible(name, old, new))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTEGER: (FieldType, Format) = (FieldType::Integer, Format::None);
    const NUMBER: (FieldType, Format) = (FieldType::Number, Format::None);
    const STRING: (FieldType, Format) = (FieldType::String, Format::None);
    const UUID: (FieldType, Format) = (FieldType::String, Format::Uuid);
    const BYTE: (FieldType, Format) = (FieldType::String, Format::Byte);
    const DATE_TIME: (FieldType, Format) = (FieldType::String, Format::DateTime);

    #[test]
    fn test_exact_match() {
        assert_eq!(extend_type("f", UUID, UUID).unwrap(), UUID);
        assert_eq!(
            extend_type("f", (FieldType::Object, Format::None), (FieldType::Object, Format::None)).unwrap(),
            (FieldType::Object, Format::None)
        );
    }

    #[test]
    fn test_numbers_widen_in_either_order() {
        assert_eq!(extend_type("f", INTEGER, NUMBER).unwrap(), NUMBER);
        assert_eq!(extend_type("f", NUMBER, INTEGER).unwrap(), NUMBER);
    }

    #[test]
    fn test_formats_relax_to_plain_string() {
        for narrow in [UUID, BYTE, DATE_TIME] {
            assert_eq!(extend_type("f", narrow, STRING).unwrap(), STRING);
            assert_eq!(extend_type("f", STRING, narrow).unwrap(), STRING);
        }
    }

    #[test]
    fn test_distinct_formats_are_incompatible() {
        assert!(extend_type("f", UUID, DATE_TIME).is_err());
        assert!(extend_type("f", BYTE, UUID).is_err());
    }

    #[test]
    fn test_incompatible_carries_both_shapes() {
        let err = extend_type("field", INTEGER, UUID).unwrap_err();
        match err {
            SchemaError::IncompatibleSchema {
                field,
                old_type,
                old_format,
                new_type,
                new_format,
            } => {
                assert_eq!(field, "field");
                assert_eq!((old_type, old_format), INTEGER);
                assert_eq!((new_type, new_format), UUID);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            extend_type("field", INTEGER, UUID).unwrap_err().to_string(),
            "incompatible schema field: field, old type: 'integer:', new type: 'string:uuid'"
        );
    }

    #[test]
    fn test_scalar_and_container_mismatch() {
        assert!(extend_type("f", (FieldType::Object, Format::None), INTEGER).is_err());
        assert!(extend_type("f", (FieldType::Array, Format::None), STRING).is_err());
        assert!(extend_type("f", (FieldType::Boolean, Format::None), INTEGER).is_err());
    }
}
