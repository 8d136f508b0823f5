//! Batch import pipeline
//!
//! Documents are read in batches by [`DocumentSource`], pushed through the
//! [`Importer`] state machine (insert, evolve the schema, retry, strip nulls,
//! retry) and shrunk by [`submit_adaptive`] whenever the store reports a
//! size limit.

pub mod cleanup;
pub mod import;
pub mod source;
pub mod submit;

pub use cleanup::cleanup_null_values;
pub use import::{BatchOutcome, ImportError, ImportOptions, ImportSummary, Importer, Stage};
pub use source::{DocumentSource, SourceError, DEFAULT_BATCH_SIZE};
pub use submit::{submit_adaptive, SizeLimited, SubmitError, SubmitReport};
