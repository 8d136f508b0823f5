//! Document and schema-update validation shared by the stores

use serde_json::{Map, Value};

use docimport_schema::{extend_type, matches_format, Field, FieldType, Fields, Format, Schema};

use crate::error::StoreError;

/// Collection names double as directory names, so keep them portable
pub(crate) fn check_collection_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid_argument(format!("invalid collection name '{name}'")))
    }
}

/// Check a decoded document against the collection schema
pub(crate) fn check_document(schema: &Schema, document: &Map<String, Value>) -> Result<(), StoreError> {
    check_members(&schema.fields, document, "")
}

fn check_members(fields: &Fields, members: &Map<String, Value>, parent: &str) -> Result<(), StoreError> {
    for (name, value) in members {
        let path = if parent.is_empty() {
            name.clone()
        } else {
            format!("{parent}.{name}")
        };
        match fields.get(name) {
            Some(field) => check_value(field, value, &path)?,
            None if is_shapeless(value) => {}
            None => {
                return Err(StoreError::invalid_argument(format!(
                    "field '{path}' is not defined in the schema"
                )))
            }
        }
    }
    Ok(())
}

/// Empty containers, and containers holding only empty containers (or nulls,
/// inside arrays), define no field during inference
fn is_shapeless(value: &Value) -> bool {
    match value {
        Value::Object(members) => members.values().all(is_shapeless),
        Value::Array(elements) => elements.iter().all(|e| e.is_null() || is_shapeless(e)),
        _ => false,
    }
}

fn check_value(field: &Field, value: &Value, path: &str) -> Result<(), StoreError> {
    match (field.field_type, value) {
        (_, Value::Null) => Err(StoreError::invalid_argument(format!(
            "null value is not allowed for field '{path}'"
        ))),
        (FieldType::Boolean, Value::Bool(_)) => Ok(()),
        (FieldType::Integer, Value::Number(n)) if n.to_string().parse::<i64>().is_ok() => Ok(()),
        (FieldType::Number, Value::Number(_)) => Ok(()),
        (FieldType::String, Value::String(s)) if matches_format(s, field.format) => Ok(()),
        (FieldType::Object, Value::Object(members)) => {
            let empty = Fields::new();
            check_members(field.fields.as_ref().unwrap_or(&empty), members, path)
        }
        (FieldType::Array, Value::Array(elements)) => match &field.items {
            Some(items) => elements
                .iter()
                .enumerate()
                .try_for_each(|(i, element)| check_value(items, element, &format!("{path}[{i}]"))),
            None if elements.is_empty() => Ok(()),
            None => Err(StoreError::invalid_argument(format!(
                "array field '{path}' has no element type"
            ))),
        },
        _ => Err(StoreError::invalid_argument(format!(
            "value of field '{path}' does not match {}",
            describe(field.field_type, field.format)
        ))),
    }
}

fn describe(field_type: FieldType, format: Format) -> String {
    if format.is_none() {
        field_type.to_string()
    } else {
        format!("{field_type}:{format}")
    }
}

/// Accept `new` as the replacement of `old` only if it widens every existing
/// field and keeps the primary key
pub fn check_schema_update(old: &Schema, new: &Schema) -> Result<(), StoreError> {
    if old.primary_key.is_some() && old.primary_key != new.primary_key {
        return Err(StoreError::invalid_argument("primary key cannot be changed"));
    }
    check_fields_update(&old.fields, &new.fields, "")
}

fn check_fields_update(old: &Fields, new: &Fields, parent: &str) -> Result<(), StoreError> {
    for (name, old_field) in old {
        let path = if parent.is_empty() {
            name.clone()
        } else {
            format!("{parent}.{name}")
        };
        let new_field = new
            .get(name)
            .ok_or_else(|| StoreError::invalid_argument(format!("field '{path}' cannot be removed")))?;
        check_field_update(old_field, new_field, &path)?;
    }
    Ok(())
}

fn check_field_update(old: &Field, new: &Field, path: &str) -> Result<(), StoreError> {
    let merged = extend_type(path, old.shape(), new.shape())
        .map_err(|err| StoreError::invalid_argument(err.to_string()))?;
    if merged != new.shape() {
        return Err(StoreError::invalid_argument(format!(
            "field '{path}' cannot be narrowed from {} to {}",
            describe(old.field_type, old.format),
            describe(new.field_type, new.format)
        )));
    }

    match (&old.fields, &new.fields) {
        (Some(old_nested), Some(new_nested)) => check_fields_update(old_nested, new_nested, path)?,
        (Some(old_nested), None) if !old_nested.is_empty() => {
            return Err(StoreError::invalid_argument(format!(
                "nested fields of '{path}' cannot be removed"
            )))
        }
        _ => {}
    }

    match (&old.items, &new.items) {
        (Some(old_items), Some(new_items)) => check_field_update(old_items, new_items, &format!("{path}[]")),
        (Some(_), None) => Err(StoreError::invalid_argument(format!(
            "element type of '{path}' cannot be removed"
        ))),
        _ => Ok(()),
    }
}
