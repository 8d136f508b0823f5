//! Recursive merge of one document's structure into an accumulating field map

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::SchemaError;
use crate::extend::extend_type;
use crate::translate::{translate_type, Detection};
use crate::types::{Field, FieldType, Fields, Format};

/// Merges documents into a field map
///
/// Nulls, empty arrays and empty objects contribute nothing. A value merged
/// into an existing field must be compatible with it; scalars are widened
/// through [`extend_type`].
pub struct Accumulator<'a> {
    detection: &'a Detection,
    auto_generate: &'a [String],
    saw_array_of_objects: bool,
}

impl<'a> Accumulator<'a> {
    pub fn new(detection: &'a Detection, auto_generate: &'a [String]) -> Self {
        Self {
            detection,
            auto_generate,
            saw_array_of_objects: false,
        }
    }

    /// Whether any merged array held an object element
    pub fn saw_array_of_objects(&self) -> bool {
        self.saw_array_of_objects
    }

    /// Merge the top-level members of a document into `fields`
    pub fn accumulate(&mut self, fields: &mut Fields, document: &Map<String, Value>) -> Result<(), SchemaError> {
        for (name, value) in document {
            self.merge_member(fields, name, value)?;

            if self.auto_generate.iter().any(|n| n == name) {
                if let Some(field) = fields.get_mut(name) {
                    field.auto_generate = true;
                }
            }
        }
        Ok(())
    }

    fn accumulate_nested(&mut self, fields: &mut Fields, members: &Map<String, Value>) -> Result<(), SchemaError> {
        for (name, value) in members {
            self.merge_member(fields, name, value)?;
        }
        Ok(())
    }

    fn merge_member(&mut self, fields: &mut Fields, name: &str, value: &Value) -> Result<(), SchemaError> {
        if value.is_null() {
            return Ok(());
        }

        let mut slot = fields.remove(name);
        let merged = self.merge_value(&mut slot, name, value);
        if let Some(field) = slot {
            fields.insert(name.to_string(), field);
        }
        merged
    }

    fn merge_value(&mut self, slot: &mut Option<Field>, name: &str, value: &Value) -> Result<(), SchemaError> {
        match value {
            Value::Null => Ok(()),
            Value::Object(members) => self.merge_object(slot, name, members),
            Value::Array(elements) => self.merge_array(slot, name, elements),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => self.merge_scalar(slot, name, value),
        }
    }

    fn merge_scalar(&mut self, slot: &mut Option<Field>, name: &str, value: &Value) -> Result<(), SchemaError> {
        let observed = translate_type(value, slot.as_ref(), self.detection)?;

        match slot {
            Some(field) => {
                let (field_type, format) = extend_type(name, field.shape(), observed)?;
                field.field_type = field_type;
                field.format = format;
            }
            None => {
                trace!(field_name = name, field_type = %observed.0, format = %observed.1, "new field");
                *slot = Some(Field::scalar(observed.0, observed.1));
            }
        }
        Ok(())
    }

    fn merge_object(
        &mut self,
        slot: &mut Option<Field>,
        name: &str,
        members: &Map<String, Value>,
    ) -> Result<(), SchemaError> {
        if members.is_empty() {
            return Ok(());
        }

        match slot {
            Some(field) if field.field_type == FieldType::Object => {
                let nested = field.fields.get_or_insert_with(Fields::new);
                self.accumulate_nested(nested, members)
            }
            Some(field) => Err(SchemaError::incompatible(
                name,
                field.shape(),
                (FieldType::Object, Format::None),
            )),
            None => {
                let mut nested = Fields::new();
                self.accumulate_nested(&mut nested, members)?;
                if !nested.is_empty() {
                    *slot = Some(Field::object(nested));
                }
                Ok(())
            }
        }
    }

    fn merge_array(&mut self, slot: &mut Option<Field>, name: &str, elements: &[Value]) -> Result<(), SchemaError> {
        // FIXME: arrays of arrays merge element-wise but carry no per-dimension metadata
        if elements.is_empty() {
            return Ok(());
        }

        let mut items = match slot {
            None => None,
            Some(field) if field.field_type == FieldType::Array => field.items.take().map(|items| *items),
            Some(field) => {
                return Err(SchemaError::incompatible(
                    name,
                    field.shape(),
                    (FieldType::Array, Format::None),
                ));
            }
        };

        let merged = elements.iter().try_for_each(|element| {
            if element.is_object() {
                self.saw_array_of_objects = true;
            }
            self.merge_value(&mut items, name, element)
        });

        if let Some(field) = slot {
            field.items = items.map(Box::new);
            return merged;
        }

        merged?;
        *slot = items.map(Field::array);
        Ok(())
    }
}
