//! Schema data model and its JSON wire encoding
//!
//! The wire shape is JSON-Schema-like:
//! `{"title": .., "properties": {..}, "primary_key": [..]}` with fields encoded
//! as `{"type", "format", "items", "properties", "autoGenerate"}`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::SchemaError;

/// Nested field map, keyed by field name
pub type Fields = BTreeMap<String, Field>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    String,
    Boolean,
    Number,
    Array,
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Number => "number",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refinement of the `string` type detected by content sniffing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "byte")]
    Byte,
    #[serde(rename = "date-time")]
    DateTime,
    #[serde(rename = "uuid")]
    Uuid,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::None => "",
            Format::Byte => "byte",
            Format::DateTime => "date-time",
            Format::Uuid => "uuid",
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Format::None
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One schema entry
///
/// `fields` is only populated for objects and `items` only for arrays; the
/// constructors keep that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default, skip_serializing_if = "Format::is_none")]
    pub format: Format,

    #[serde(rename = "properties", default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Field>>,

    #[serde(rename = "autoGenerate", default, skip_serializing_if = "is_false")]
    pub auto_generate: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Field {
    pub fn scalar(field_type: FieldType, format: Format) -> Self {
        Self {
            field_type,
            format,
            fields: None,
            items: None,
            auto_generate: false,
        }
    }

    pub fn object(fields: Fields) -> Self {
        Self {
            fields: Some(fields),
            ..Self::scalar(FieldType::Object, Format::None)
        }
    }

    pub fn array(items: Field) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::scalar(FieldType::Array, Format::None)
        }
    }

    pub fn auto_generated(mut self) -> Self {
        self.auto_generate = true;
        self
    }

    /// The (type, format) pair the translator and extender operate on
    pub fn shape(&self) -> (FieldType, Format) {
        (self.field_type, self.format)
    }
}

/// Named structural description of a collection's documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "title", default)]
    pub name: String,

    #[serde(rename = "properties", default)]
    pub fields: Fields,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// SHA-256 of the wire encoding; field maps are ordered so equal schemas
    /// hash equally
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("schema should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
