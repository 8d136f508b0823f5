//! Schema inference driver

use serde_json::Value;
use tracing::debug;

use crate::accumulate::Accumulator;
use crate::error::SchemaError;
use crate::translate::Detection;
use crate::types::{Format, Schema};
use crate::RawDocument;

#[derive(Debug, Clone, Default)]
pub struct InferenceOptions {
    /// Explicit primary key; ignored when empty
    pub primary_key: Vec<String>,

    /// Top-level fields flagged as generated by the store
    pub auto_generate: Vec<String>,

    /// Maximum number of documents examined, 0 = all
    pub depth: usize,

    pub detection: Detection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceReport {
    pub documents_examined: usize,
    pub has_array_of_objects: bool,
}

/// Build or extend `schema` from the leading documents of a batch
///
/// Stops at the first error. Changes made before the error are kept, so a
/// caller that needs atomicity must discard `schema` on failure.
pub fn infer(
    schema: &mut Schema,
    name: &str,
    documents: &[RawDocument],
    options: &InferenceOptions,
) -> Result<InferenceReport, SchemaError> {
    schema.name = name.to_string();
    if !options.primary_key.is_empty() {
        schema.primary_key = Some(options.primary_key.clone());
    }

    let limit = match options.depth {
        0 => documents.len(),
        depth => depth.min(documents.len()),
    };

    let mut accumulator = Accumulator::new(&options.detection, &options.auto_generate);

    for (index, raw) in documents.iter().take(limit).enumerate() {
        let value: Value =
            serde_json::from_str(raw.get()).map_err(|source| SchemaError::Decode { index, source })?;
        let Value::Object(members) = value else {
            return Err(SchemaError::NotAnObject { index });
        };

        accumulator.accumulate(&mut schema.fields, &members)?;
    }

    apply_implicit_primary_key(schema);

    debug!(
        collection = name,
        examined = limit,
        fields = schema.fields.len(),
        "schema inferred"
    );

    Ok(InferenceReport {
        documents_examined: limit,
        has_array_of_objects: accumulator.saw_array_of_objects(),
    })
}

/// A uuid `id` becomes the generated primary key when none was given
fn apply_implicit_primary_key(schema: &mut Schema) {
    if schema.primary_key.is_some() {
        return;
    }

    if let Some(id) = schema.fields.get_mut("id") {
        if id.format == Format::Uuid {
            id.auto_generate = true;
            schema.primary_key = Some(vec!["id".to_string()]);
        }
    }
}
