//! docimport schema inference engine
//!
//! Derives a structural schema from batches of schema-less JSON documents.
//! Observations of the same field across documents are merged, widening
//! types where that is safe (integer to number, sniffed string formats to
//! plain string) and failing with [`SchemaError::IncompatibleSchema`] where it
//! is not.

mod accumulate;
mod error;
mod extend;
mod infer;
mod translate;
mod types;

pub use accumulate::Accumulator;
pub use error::SchemaError;
pub use extend::extend_type;
pub use infer::{infer, InferenceOptions, InferenceReport};
pub use translate::{is_base64, is_date_time, is_uuid, matches_format, translate_type, Detection};
pub use types::*;

pub use serde_json::value::RawValue;

/// A single undecoded JSON document as read from the input.
pub type RawDocument = Box<RawValue>;
