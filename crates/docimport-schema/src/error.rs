use thiserror::Error;

use crate::types::{FieldType, Format};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported type: kind='{kind}'")]
    UnsupportedType { kind: &'static str },

    #[error(
        "incompatible schema field: {field}, old type: '{old_type}:{old_format}', new type: '{new_type}:{new_format}'"
    )]
    IncompatibleSchema {
        field: String,
        old_type: FieldType,
        old_format: Format,
        new_type: FieldType,
        new_format: Format,
    },

    #[error("invalid number literal: {0}")]
    InvalidNumber(String),

    #[error("document {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("failed to decode document {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("schema encoding error: {0}")]
    Wire(#[from] serde_json::Error),
}

impl SchemaError {
    pub fn incompatible(field: &str, old: (FieldType, Format), new: (FieldType, Format)) -> Self {
        SchemaError::IncompatibleSchema {
            field: field.to_string(),
            old_type: old.0,
            old_format: old.1,
            new_type: new.0,
            new_format: new.1,
        }
    }
}
