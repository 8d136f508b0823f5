//! Import orchestration
//!
//! An [`Importer`] owns the accumulated schema of one target collection for
//! the length of an import. Each batch goes through
//!
//! ```text
//! TryInsert -> EvolveSchema -> RetryInsert -> CleanupNulls -> FinalInsert
//! ```
//!
//! stopping at the first insert that succeeds. Evolution re-infers the schema
//! from the rejected batch and pushes it to the store.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use docimport_schema::{infer, Detection, InferenceOptions, RawDocument, Schema, SchemaError};
use docimport_store::{CallContext, CollectionStore, ErrorKind, StoreError};

use crate::cleanup::cleanup_null_values;
use crate::source::SourceError;
use crate::submit::{submit_adaptive, SizeLimited, SubmitError, SubmitReport};

/// Upper bound for a single store call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Insert attempt at which a batch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    AfterEvolution,
    AfterCleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Initial => f.write_str("initial"),
            Stage::AfterEvolution => f.write_str("after schema update"),
            Stage::AfterCleanup => f.write_str("after null cleanup"),
        }
    }
}

/// Insert attempt at which a batch landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Inserted,
    InsertedAfterEvolution,
    InsertedAfterCleanup,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import documents ({stage}): {source}")]
    Insert {
        stage: Stage,
        #[source]
        source: StoreError,
    },

    #[error("create or update collection: {0}")]
    Evolve(#[source] StoreError),

    #[error("describe collection: {0}")]
    Describe(#[source] StoreError),

    #[error("infer schema: {0}")]
    Inference(#[source] SchemaError),

    #[error("marshal schema: {0}")]
    Encode(#[source] SchemaError),

    #[error("unmarshal collection schema: {0}")]
    Decode(#[source] SchemaError),

    #[error("cleanup document {index}: {source}")]
    Cleanup {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("collection '{0}' exists. use append to add documents to an existing collection")]
    CollectionExists(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Submit(Box<SubmitError<ImportError>>),
}

impl ImportError {
    /// Stage of a failed insert
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ImportError::Insert { stage, .. } => Some(*stage),
            ImportError::Submit(err) => err.operation_error().and_then(ImportError::stage),
            _ => None,
        }
    }

    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ImportError::Insert { source, .. } | ImportError::Evolve(source) | ImportError::Describe(source) => {
                Some(source)
            }
            ImportError::Submit(err) => err.operation_error().and_then(ImportError::store_error),
            _ => None,
        }
    }
}

impl SizeLimited for ImportError {
    fn is_size_limit(&self) -> bool {
        matches!(self, ImportError::Insert { source, .. } if source.is_size_limit())
    }
}

impl From<SubmitError<ImportError>> for ImportError {
    fn from(err: SubmitError<ImportError>) -> Self {
        ImportError::Submit(Box::new(err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Allow importing into a collection that already exists
    pub append: bool,

    /// Create the collection and evolve its schema on rejected inserts
    pub auto_create: bool,

    /// Documents examined per evolution, 0 = whole batch
    pub inference_depth: usize,

    pub primary_key: Vec<String>,

    pub auto_generate: Vec<String>,

    /// Strip nulls and empty arrays before the last insert attempt
    pub cleanup_null_values: bool,

    pub detection: Detection,

    /// Per store call; `None` leaves only the caller's deadline
    #[serde(with = "timeout_ms")]
    pub call_timeout: Option<Duration>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            append: false,
            auto_create: true,
            inference_depth: 0,
            primary_key: Vec::new(),
            auto_generate: Vec::new(),
            cleanup_null_values: true,
            detection: Detection::default(),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }
}

mod timeout_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(timeout: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        timeout.map(|t| t.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub batches: usize,
    pub documents: usize,
    pub evolutions: usize,
    pub cleanups: usize,
}

pub struct Importer<'s, S: CollectionStore> {
    store: &'s mut S,
    collection: String,
    options: ImportOptions,
    schema: Schema,
    summary: ImportSummary,
}

impl<'s, S: CollectionStore> Importer<'s, S> {
    /// Start an import into `collection`, picking up its stored schema when it
    /// exists and `append` is set
    pub fn open(
        store: &'s mut S,
        ctx: &CallContext,
        collection: impl Into<String>,
        options: ImportOptions,
    ) -> Result<Self, ImportError> {
        let collection = collection.into();

        let schema = match store.describe_collection(&ctx.child(options.call_timeout), &collection) {
            Ok(_) if !options.append => return Err(ImportError::CollectionExists(collection)),
            Ok(json) => Schema::from_json(&json).map_err(ImportError::Decode)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Schema::new(collection.as_str()),
            Err(err) => return Err(ImportError::Describe(err)),
        };

        info!(
            collection = collection.as_str(),
            existing = !schema.is_empty(),
            "import started"
        );

        Ok(Self {
            store,
            collection,
            options,
            schema,
            summary: ImportSummary::default(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn summary(&self) -> ImportSummary {
        self.summary
    }

    /// Insert one batch as is, evolving the schema and stripping nulls if the
    /// store rejects it
    pub fn import_batch(&mut self, ctx: &CallContext, documents: &[RawDocument]) -> Result<BatchOutcome, ImportError> {
        if documents.is_empty() {
            return Ok(BatchOutcome::Inserted);
        }

        let err = match self.insert(ctx, documents) {
            Ok(()) => return Ok(BatchOutcome::Inserted),
            Err(err) => err,
        };

        let evolvable = matches!(err.kind(), ErrorKind::NotFound | ErrorKind::InvalidArgument);
        if !evolvable || !self.options.auto_create {
            return Err(self.failed(Stage::Initial, err, documents.len()));
        }

        debug!(collection = self.collection.as_str(), error = %err, "insert rejected, evolving schema");
        self.evolve(ctx, documents)?;

        let err = match self.insert(ctx, documents) {
            Ok(()) => return Ok(BatchOutcome::InsertedAfterEvolution),
            Err(err) => err,
        };
        // size-limited batches go back to the submitter to be split
        if !self.options.cleanup_null_values || err.is_size_limit() {
            return Err(self.failed(Stage::AfterEvolution, err, documents.len()));
        }

        debug!(collection = self.collection.as_str(), error = %err, "insert rejected after schema update, removing null values");
        let cleaned = documents
            .iter()
            .enumerate()
            .map(|(index, document)| {
                cleanup_null_values(document).map_err(|source| ImportError::Cleanup { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.summary.cleanups += 1;

        match self.insert(ctx, &cleaned) {
            Ok(()) => Ok(BatchOutcome::InsertedAfterCleanup),
            Err(err) => Err(self.failed(Stage::AfterCleanup, err, documents.len())),
        }
    }

    /// Import a batch, splitting it whenever the store reports a size limit
    pub fn import(&mut self, ctx: &CallContext, batch: &[RawDocument]) -> Result<SubmitReport, ImportError> {
        let report = submit_adaptive(batch, |window| self.import_batch(ctx, window).map(|_| ()))?;

        self.summary.batches += 1;
        self.summary.documents += report.submitted;
        if report.splits > 0 {
            debug!(
                collection = self.collection.as_str(),
                splits = report.splits,
                working_size = report.working_size,
                "batch split to fit size limits"
            );
        }
        Ok(report)
    }

    /// Import every batch of `source` in order, stopping at the first failure
    pub fn import_all<I>(&mut self, ctx: &CallContext, source: I) -> Result<ImportSummary, ImportError>
    where
        I: IntoIterator<Item = Result<Vec<RawDocument>, SourceError>>,
    {
        for batch in source {
            self.import(ctx, &batch?)?;
        }

        info!(
            collection = self.collection.as_str(),
            batches = self.summary.batches,
            documents = self.summary.documents,
            evolutions = self.summary.evolutions,
            "import finished"
        );
        Ok(self.summary)
    }

    fn insert(&mut self, ctx: &CallContext, documents: &[RawDocument]) -> Result<(), StoreError> {
        let call = ctx.child(self.options.call_timeout);
        self.store.insert(&call, &self.collection, documents)
    }

    /// Re-infer from `documents` and push the result; the owned schema only
    /// changes once the store accepted it
    fn evolve(&mut self, ctx: &CallContext, documents: &[RawDocument]) -> Result<(), ImportError> {
        let depth = match self.options.inference_depth {
            0 => documents.len(),
            depth => depth,
        };
        let options = InferenceOptions {
            primary_key: self.options.primary_key.clone(),
            auto_generate: self.options.auto_generate.clone(),
            depth,
            detection: self.options.detection,
        };

        let mut evolved = self.schema.clone();
        let report = infer(&mut evolved, &self.collection, documents, &options).map_err(ImportError::Inference)?;
        let json = evolved.to_json().map_err(ImportError::Encode)?;

        let call = ctx.child(self.options.call_timeout);
        self.store
            .create_or_update_collection(&call, &self.collection, &json)
            .map_err(ImportError::Evolve)?;

        let changed = evolved.fingerprint() != self.schema.fingerprint();
        self.schema = evolved;
        self.summary.evolutions += 1;

        debug!(
            collection = self.collection.as_str(),
            examined = report.documents_examined,
            changed,
            fingerprint = %self.schema.fingerprint(),
            "schema evolved"
        );
        if report.has_array_of_objects {
            debug!(collection = self.collection.as_str(), "batch contains arrays of objects");
        }
        Ok(())
    }

    fn failed(&self, stage: Stage, source: StoreError, documents: usize) -> ImportError {
        warn!(
            collection = self.collection.as_str(),
            %stage,
            documents,
            error = %source,
            "batch import failed"
        );
        ImportError::Insert { stage, source }
    }
}
